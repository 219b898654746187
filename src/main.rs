mod classifier;
mod cli;
mod commands;
mod config;
mod error;
mod evaluation;
mod forge;
mod input;
mod orchestrator;
mod retry;
mod state_machine;
mod summary;
mod tsv;
mod ui;

use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use commands::Context;
use config::LabelerConfig;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = LabelerConfig::load(cli.config.as_deref())?;
    let ctx = Context::new(config, cli.retries);

    match cli.command {
        Command::Download(args) => commands::download::run(args, &ctx).await,
        Command::Predict(args) => commands::predict::run(args, &ctx).await,
        Command::Test(args) => commands::test::run(args, &ctx).await,
        Command::Validate(args) => commands::validate::run(&args),
    }
}

/// `RUST_LOG` wins; otherwise `info`, or `debug` with `--verbose`.
fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
