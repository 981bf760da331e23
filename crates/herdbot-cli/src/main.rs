//! Herdbot CLI: entry point.
//!
//! # Commands
//!
//! - `herdbot run [-c CONFIG] [--logs]`: start all configured bots
//! - `herdbot check [-c CONFIG]`: validate config and summarize bots
//! - `herdbot init [-c CONFIG]`: write a starter config

mod check;
mod console;
mod helpers;
mod init;
mod run;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// 🐑 Herdbot: run a herd of chat bots
#[derive(Parser)]
#[command(name = "herdbot", version, about, long_about = None)]
struct Cli {
    /// Path to the config file (default: ./config.yml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start every configured bot
    Run {
        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Validate the config and show each bot
    Check,

    /// Write a starter config file
    Init,
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Run { logs } => {
            init_logging(logs);
            run::run(config).await
        }
        Commands::Check => check::run(config),
        Commands::Init => init::run(config),
    }
}

/// Initialize tracing/logging. `RUST_LOG` wins when set.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("herdbot=debug,info")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
