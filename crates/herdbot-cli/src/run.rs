//! `herdbot run`: start every configured bot on the console transport.
//!
//! Startup sequence:
//! 1. Load + validate config (fatal on error)
//! 2. Build the manager with the console transport and default handlers
//! 3. Create all bots (auto-connect as configured), start the monitor
//! 4. Pump stdin into the bots until Ctrl+C or EOF
//! 5. Shut the manager down

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use tracing::info;

use herdbot_bots::Manager;
use herdbot_core::config::load_config;
use herdbot_handlers::default_handlers;

use crate::console::ConsoleFactory;
use crate::helpers;

pub async fn run(config_arg: Option<&Path>) -> Result<()> {
    helpers::print_banner();
    println!("  Mode: Console");
    println!();

    let path = helpers::config_path(config_arg);
    let config = load_config(Some(&path)).context("failed to load config")?;
    config.validate().context("config is not valid")?;

    let handlers = default_handlers().context("failed to build message handlers")?;
    let transports = ConsoleFactory::new();

    let manager = Manager::launch(config, transports.clone(), handlers);

    let names = manager.names();
    println!(
        "  {:<10} {}",
        "Bots:".bold(),
        if names.is_empty() {
            "(none created)".dimmed().to_string()
        } else {
            names.join(", ")
        }
    );
    if let Some(log_path) = manager.event_log().path() {
        println!("  {:<10} {}", "Event log:".bold(), log_path.display());
    }
    println!();
    println!("{}", "Type \"#channel nick: message\", Ctrl+C to quit.".dimmed());
    println!();

    let stdin = tokio::spawn(transports.pump_stdin());

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for Ctrl+C")?;
            info!("received Ctrl+C");
        }
        _ = stdin => {
            info!("input closed");
        }
    }

    manager.shutdown().await;
    println!();
    println!("{}", "Goodbye!".dimmed());
    Ok(())
}
