//! CLI for tablerest.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tablerest_core::config;

use commands::{run_batch_file, run_show_config, BatchArgs};

/// Top-level CLI for tablerest.
#[derive(Debug, Parser)]
#[command(name = "tablerest")]
#[command(about = "tablerest: phase-synchronized batch operations over resource stores", long_about = None)]
pub struct Cli {
    /// Read configuration from this file instead of the XDG config path.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run a JSON batch of create/update/delete operations and print each outcome.
    Batch {
        /// Path to a JSON array of operations.
        file: PathBuf,
        /// Maximum operations admitted per phase (overrides config).
        #[arg(long, value_name = "N")]
        concurrency: Option<usize>,
        /// Trace phase and job lifecycle events.
        #[arg(long)]
        debug: bool,
        /// Commit successful operations even if others fail.
        #[arg(long)]
        no_atomic: bool,
        /// JSON object mapping resource names to initial records.
        #[arg(long, value_name = "FILE")]
        seed: Option<PathBuf>,
    },

    /// Show the config file path and effective configuration.
    Config,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let (cfg, path) = match &cli.config {
            Some(path) => (config::load_from_path(path)?, path.clone()),
            None => (config::load_or_init()?, config::config_path()?),
        };
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Batch {
                file,
                concurrency,
                debug,
                no_atomic,
                seed,
            } => {
                let args = BatchArgs {
                    file,
                    concurrency,
                    debug,
                    no_atomic,
                    seed,
                };
                run_batch_file(&cfg, &args).await?;
            }
            CliCommand::Config => run_show_config(&cfg, &path)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
