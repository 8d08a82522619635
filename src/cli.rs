use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "gatepeeker",
    version,
    about = "Validate configurations against Gatekeeper policies"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Output machine-readable JSON")]
    pub json: bool,
    #[arg(
        long,
        global = true,
        env = "GATEPEEKER_CONFIG",
        help = "Configuration file (defaults to ~/.config/gatepeeker/config.toml)"
    )]
    pub config: Option<PathBuf>,
    #[arg(long, global = true, help = "Show more log information")]
    pub verbose: bool,
    #[arg(
        long,
        global = true,
        help = "Log filter (trace, debug, info, warn, error or a directive list)"
    )]
    pub log_level: Option<String>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Bundle policies into an artifact
    ///
    /// Policies are read from stdin and from every --policies source, in
    /// that order, and written to stdout:
    ///
    ///   cat manifests.yaml | gatepeeker build > policies.yaml
    Build {
        #[arg(long = "policies", help = "A location to load policies from")]
        policies: Vec<String>,
        #[arg(long, help = "Also write the bundle as a tar.gz archive")]
        archive: Option<PathBuf>,
        #[arg(long, help = "Also write the bundle file under this directory")]
        output_dir: Option<PathBuf>,
        #[arg(
            long,
            hide = true,
            help = "EXPERIMENTAL: write an OCI image layout to this directory"
        )]
        build_oci: Option<PathBuf>,
    },
    /// Validate manifests against a policy bundle
    Validate {
        #[arg(long = "policies", help = "A location to load policies from")]
        policies: Vec<String>,
        #[arg(long, help = "Evaluation engine command (overrides config)")]
        engine: Option<String>,
        #[arg(
            long,
            default_value_t = false,
            help = "Continue with the policies the engine accepts"
        )]
        skip_invalid_policies: bool,
        #[arg(help = "Manifest sources to validate (stdin is read when piped)")]
        manifests: Vec<String>,
    },
    /// List the templates and constraints a bundle contains
    Inspect {
        #[arg(long = "policies", help = "A location to load policies from")]
        policies: Vec<String>,
    },
}
