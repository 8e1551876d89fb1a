//! Revive CLI
//!
//! Runs one invocation of the metagraph restart controller. Meant to be
//! triggered on a schedule (cron, systemd timer); every run is independent
//! and the persisted restart record carries progress between runs.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{common, record, run};

#[derive(Parser)]
#[command(name = "revive")]
#[command(about = "Revive - automated restart controller for metagraph clusters", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path
    #[arg(short, long, global = true, default_value = "revive.toml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one controller invocation
    Run {
        /// Start a full cluster restart regardless of health, unless an
        /// episode is already open
        #[arg(long)]
        force: bool,
    },

    /// Show the stored restart record
    Status,

    /// Delete the stored restart record
    Clear,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = common::load_config(&cli.config)?;

    match cli.command {
        Commands::Run { force } => {
            if force {
                config.cluster.force_restart = true;
            }
            run::run(config).await?;
        }
        Commands::Status => {
            record::show_status(config).await?;
        }
        Commands::Clear => {
            record::clear(config).await?;
        }
    }

    Ok(())
}
