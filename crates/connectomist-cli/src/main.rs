//! Connectomist CLI
//!
//! Runs the Connectomist preprocessing, tractography and labeling pipelines.

#![forbid(unsafe_code)]

use std::process::ExitCode;

use clap::Parser;
use connectomist_cli::cli::Cli;
use connectomist_cli::{exit_status, logging, run};
use connectomist_core::{ConfigManager, Settings};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref());
    let level = settings.as_ref().ok().map(|s| s.logging.level.as_str());
    logging::init(cli.verbose, level);

    let mut stdout = std::io::stdout();
    match run(cli, settings, &mut stdout).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(error = ?err, "Command failed");
            eprintln!("Error: {err:#}");
            ExitCode::from(exit_status(&err))
        }
    }
}
