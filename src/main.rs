mod bundle;
mod cli;
mod commands;
mod domain;
mod services;

use clap::Parser;
use cli::{Cli, Commands};
use commands::build::BuildTargets;
use commands::{error_code, handle_build, handle_inspect, handle_validate, Context, Outcome};
use services::output::print_error;
use std::io::IsTerminal;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    match run(&cli) {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(e) => {
            let message = format!("{:#}", e);
            if cli.json {
                print_error(error_code(&e), &message);
            } else {
                error!(error = %message, "terminated with error");
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) {
    let default = if cli.verbose { "info" } else { "warn" };
    let filter = match &cli.log_level {
        Some(level) => EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new(default)),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal())
                .with_target(false)
                .without_time(),
        )
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<Outcome> {
    let ctx = Context::new(cli)?;
    match &cli.command {
        Commands::Build {
            policies,
            archive,
            output_dir,
            build_oci,
        } => handle_build(
            &ctx,
            policies,
            BuildTargets {
                archive: archive.as_deref(),
                output_dir: output_dir.as_deref(),
                build_oci: build_oci.as_deref(),
            },
        ),
        Commands::Validate {
            policies,
            engine,
            skip_invalid_policies,
            manifests,
        } => handle_validate(
            &ctx,
            policies,
            engine.as_deref(),
            *skip_invalid_policies,
            manifests,
        ),
        Commands::Inspect { policies } => handle_inspect(&ctx, policies),
    }
}
