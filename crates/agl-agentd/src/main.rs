mod cli;
mod commands;
mod http;
mod print;
mod signal;

use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, warn};

use agl_exporter::SpanPipeline;
use agl_observe::{BoxedLayer, LoggerConfig, LoggerFormat, logger_init_with};

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    match run(cli, dotenv).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(
    cli: Cli,
    dotenv: Result<std::path::PathBuf, dotenvy::Error>,
) -> anyhow::Result<ExitCode> {
    // The span layer has to be installed together with the logger.
    let (extra, spans) = match &cli.command {
        Command::Worker(args) if args.export.enabled => {
            let (pipeline, rx) = SpanPipeline::new(&args.export.service_name);
            let layer: BoxedLayer = pipeline.boxed_layer();
            (Some(layer), Some((pipeline, rx)))
        }
        _ => (None, None),
    };

    let format: LoggerFormat = cli.log_format.parse()?;
    let logger = LoggerConfig {
        format,
        level: cli.log_level.clone(),
        ..Default::default()
    };
    logger_init_with(&logger, extra)?;

    match dotenv {
        Ok(path) => debug!(path = %path.display(), "loaded environment from .env"),
        Err(e) if e.not_found() => {}
        Err(e) => warn!(error = %e, "failed to load .env"),
    }

    match &cli.command {
        Command::Worker(args) => commands::worker::run(&cli, args, spans).await,
        Command::Monitor(args) => commands::monitor::run(&cli, args).await,
        Command::Submit(args) => commands::tools::submit(&cli, args).await,
        Command::Evaluate => commands::tools::evaluate(&cli).await,
        Command::Status(args) => commands::tools::status(&cli, args).await,
        Command::Analyze => commands::tools::analyze(&cli).await,
        Command::Check(args) => Ok(commands::check::run(&cli, args)),
    }
}
