//! Command handler layer.
//!
//! This module owns CLI-oriented orchestration and output wiring.
//!
//! ## Files
//! - `build.rs` — merge policy sources and emit the bundle (YAML/archive/OCI).
//! - `validate.rs` — load a bundle into the engine and report on manifests.
//! - `inspect.rs` — list bundle contents and duplicate identity keys.
//!
//! ## Principles
//! - Parse/match CLI inputs here.
//! - Delegate business logic to `services/*`.
//! - Keep behavior and output schema stable.

pub mod build;
pub mod inspect;
pub mod validate;

pub use build::handle_build;
pub use inspect::handle_inspect;
pub use validate::handle_validate;

use crate::bundle::{parse_policies, Bundle, BundleError};
use crate::cli::Cli;
use crate::services::config::{load_config, Config};
use crate::services::engine::EngineError;
use crate::services::oci::OciError;
use crate::services::registry::ResourceRegistry;
use crate::services::sources::{read_stdin_if_piped, FileLoader, SourceError, SourceLoader};
use crate::services::validating::ValidateError;
use anyhow::Context as _;
use tracing::warn;

/// How a command finished; mapped to the process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// At least one resource was denied.
    Denied,
    /// Nothing, or not everything, could be validated.
    Incomplete,
}

impl Outcome {
    pub fn exit_code(self) -> u8 {
        match self {
            Outcome::Success => 0,
            Outcome::Denied => 2,
            Outcome::Incomplete => 1,
        }
    }
}

/// Per-invocation state built once from the CLI and configuration.
pub struct Context {
    pub json: bool,
    pub config: Config,
    pub registry: ResourceRegistry,
    pub loader: FileLoader,
}

impl Context {
    pub fn new(cli: &Cli) -> anyhow::Result<Self> {
        let config = load_config(cli.config.as_deref())?;
        let registry = ResourceRegistry::from_config(&config.resources);
        let loader = FileLoader::new(config.sources.http_timeout_ms);
        Ok(Self {
            json: cli.json,
            config,
            registry,
            loader,
        })
    }
}

/// Parses stdin (when piped) into `bundle`.
pub fn merge_stdin(ctx: &Context, bundle: &mut Bundle) -> anyhow::Result<()> {
    let stdin = read_stdin_if_piped().context("failed to read stdin")?;
    if !stdin.is_empty() {
        let parsed =
            parse_policies(&stdin, &ctx.registry).context("failed to build bundle from yaml")?;
        bundle.merge(parsed);
    }
    Ok(())
}

/// Reads and parses every policy source into `bundle`, in order.
pub fn merge_sources(ctx: &Context, sources: &[String], bundle: &mut Bundle) -> anyhow::Result<()> {
    for source in sources {
        let buf = ctx
            .loader
            .read_bytes(source)
            .with_context(|| format!("failed to read policy source {}", source))?;
        let parsed = parse_policies(&buf, &ctx.registry)
            .with_context(|| format!("failed to build bundle from {}", source))?;
        bundle.merge(parsed);
    }
    Ok(())
}

pub fn warn_duplicates(bundle: &Bundle) {
    for key in bundle.duplicate_keys() {
        warn!(%key, "policy defined more than once; every copy is kept");
    }
}

/// Stable error code for `--json` error envelopes.
pub fn error_code(err: &anyhow::Error) -> &'static str {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<ValidateError>() {
            return match e {
                ValidateError::Configuration(_) => "CONFIG",
                ValidateError::EngineLoad { .. } | ValidateError::Review { .. } => "ENGINE",
                _ => "VALIDATION_FAILED",
            };
        }
        if cause.downcast_ref::<SourceError>().is_some() {
            return "SOURCE";
        }
        if cause.downcast_ref::<BundleError>().is_some() {
            return "BUNDLE";
        }
        if cause.downcast_ref::<EngineError>().is_some() {
            return "ENGINE";
        }
        if cause.downcast_ref::<OciError>().is_some() {
            return "PACKAGE";
        }
        if cause.downcast_ref::<toml::de::Error>().is_some() {
            return "CONFIG";
        }
    }
    "INTERNAL"
}
