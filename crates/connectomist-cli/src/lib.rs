#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]

//! Connectomist CLI
//!
//! Argument parsing and command dispatch for the `connectomist` binary.

pub mod cli;
pub mod commands;
pub mod config_handlers;
pub mod logging;

use std::io::Write;

use connectomist_core::{Connectomist, Settings};

use crate::cli::{Cli, Command};
use crate::config_handlers::handle_config_command;

/// Exit status for a failed command: 2 for input mistakes, 1 for toolkit
/// and I/O failures.
pub fn exit_status(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<connectomist_core::Error>() {
        Some(err) if err.is_user_error() => 2,
        _ => 1,
    }
}

/// Runs a parsed command line, printing results to `out`.
///
/// `settings` is the outcome of loading the configuration; the `config`
/// subcommands run even when it failed.
pub async fn run(
    cli: Cli,
    settings: connectomist_core::Result<Settings>,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let launcher = cli.connectomist_path;
    match cli.command {
        Command::Config { action } => {
            handle_config_command(cli.config.as_deref(), action, out)?;
            Ok(())
        }
        Command::Preproc(args) => {
            let connectomist = connect(settings?, launcher).await?;
            commands::preproc(&connectomist, args, out).await
        }
        Command::Tractography(args) => {
            let connectomist = connect(settings?, launcher).await?;
            commands::tractography(&connectomist, args, out).await
        }
        Command::Labeling(args) => {
            let connectomist = connect(settings?, launcher).await?;
            commands::labeling(&connectomist, args, out).await
        }
    }
}

async fn connect(
    mut settings: Settings,
    launcher: Option<std::path::PathBuf>,
) -> connectomist_core::Result<Connectomist> {
    if let Some(path) = launcher {
        settings.connectomist_path = path;
    }
    tracing::debug!(launcher = %settings.connectomist_path.display(), "Connecting to Connectomist");
    settings.connect().await
}
