use crate::bundle::Bundle;
use crate::commands::{merge_sources, warn_duplicates, Context, Outcome};
use crate::services::config::LoadMode;
use crate::services::engine::{ExecEngine, ReviewOptions};
use crate::services::output::print_json;
use crate::services::reporting::Report;
use crate::services::sources::{read_stdin_if_piped, SourceLoader};
use crate::services::validating::{Client, ClientOptions, ValidateError};
use serde::Serialize;
use std::io::Write;
use tracing::{error, info};

#[derive(Serialize)]
struct InputReport {
    source: String,
    report: Report,
}

#[derive(Serialize)]
struct ValidateOutput {
    inputs: Vec<InputReport>,
    resources: usize,
    failure_count: usize,
    document_failures: usize,
    skipped_policies: Vec<String>,
}

pub fn handle_validate(
    ctx: &Context,
    policies: &[String],
    engine: Option<&str>,
    skip_invalid_policies: bool,
    manifests: &[String],
) -> anyhow::Result<Outcome> {
    let mut bundle = Bundle::new();
    merge_sources(ctx, policies, &mut bundle)?;
    warn_duplicates(&bundle);

    let command = engine
        .map(str::to_string)
        .or_else(|| ctx.config.engine.command.clone())
        .ok_or_else(|| {
            ValidateError::Configuration(
                "no evaluation engine configured; set [engine] command or pass --engine"
                    .to_string(),
            )
        })?;
    let options = ClientOptions {
        load: if skip_invalid_policies {
            LoadMode::SkipInvalid
        } else {
            ctx.config.engine.load
        },
        review: ReviewOptions {
            enforcement_point: ctx.config.engine.enforcement_point.clone(),
            tracing: ctx.config.engine.tracing,
        },
    };
    let engine = ExecEngine::new(command, ctx.config.engine.args.clone());
    let (client, rejected) = Client::with_bundle(&bundle, engine, options)?;

    let inputs = read_inputs(ctx, manifests);
    if inputs.is_empty() {
        anyhow::bail!("no files were validated");
    }

    let mut reports = Vec::with_capacity(inputs.len());
    for (source, input) in inputs {
        let report = client.validate(&input)?;
        info!(%source, resources = report.len(), failures = report.failure_count(), "validated input");
        reports.push(InputReport { source, report });
    }

    let resources: usize = reports.iter().map(|r| r.report.len()).sum();
    let failure_count: usize = reports.iter().map(|r| r.report.failure_count()).sum();
    let document_failures: usize = reports.iter().map(|r| r.report.failures().len()).sum();

    let outcome = if failure_count > 0 {
        error!(failures = failure_count, "validation failed");
        Outcome::Denied
    } else if resources == 0 || document_failures > 0 {
        Outcome::Incomplete
    } else {
        Outcome::Success
    };

    if ctx.json {
        print_json(
            outcome == Outcome::Success,
            ValidateOutput {
                inputs: reports,
                resources,
                failure_count,
                document_failures,
                skipped_policies: rejected
                    .into_iter()
                    .map(|r| format!("{}: {}", r.key, r.error))
                    .collect(),
            },
        )?;
    } else {
        let mut out = std::io::stdout().lock();
        for r in &reports {
            r.report.write_to(&mut out)?;
        }
        out.flush()?;
    }
    Ok(outcome)
}

/// Collects stdin (when piped) and every manifest source.
///
/// Sources that cannot be read are logged and skipped.
fn read_inputs(ctx: &Context, manifests: &[String]) -> Vec<(String, Vec<u8>)> {
    let mut inputs = Vec::new();
    match read_stdin_if_piped() {
        Ok(buf) if !buf.is_empty() => inputs.push(("-".to_string(), buf)),
        Ok(_) => {}
        Err(e) => error!(error = %e, "unable to read stdin"),
    }
    for source in manifests {
        match ctx.loader.read_bytes(source) {
            Ok(buf) => inputs.push((source.clone(), buf)),
            Err(e) => error!(%source, error = %e, "unable to read manifests"),
        }
    }
    inputs
}
