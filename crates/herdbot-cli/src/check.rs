//! `herdbot check`: load and validate the config, then summarize each bot.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use herdbot_core::config::load_config;

use crate::helpers::{self, flag, mark};

/// Run the check command. Fails (non-zero exit) on an unusable config.
pub fn run(config_arg: Option<&Path>) -> Result<()> {
    let path = helpers::config_path(config_arg);

    println!();
    println!("{}", "🐑 Herdbot Config Check".cyan().bold());
    println!();
    println!("  {:<14} {} {}", "Config:".bold(), path.display(), mark(path.exists(), "(not found)"));

    let config = load_config(Some(&path)).context("failed to load config")?;

    println!(
        "  {:<14} {}",
        "Event log:".bold(),
        config.log_file.as_deref().unwrap_or("stdout").dimmed()
    );
    println!(
        "  {:<14} {}",
        "Monitor:".bold(),
        if config.monitor.enabled {
            format!("every {}s", config.monitor.interval_secs).green().to_string()
        } else {
            "off".dimmed().to_string()
        }
    );

    println!();
    println!("  {}", "Bots:".bold());
    if config.bots.is_empty() {
        println!("    {}", "(none configured)".dimmed());
    }
    for (name, bot) in &config.bots {
        println!(
            "    {:<16} user: {:<16} credentials: {}",
            name.bold(),
            if bot.user.is_empty() { "-" } else { bot.user.as_str() },
            mark(bot.has_credentials(), "missing")
        );
        println!(
            "    {:<16} channels: {}  create: {}  autoConnect: {}",
            "",
            if bot.channels.is_empty() {
                "-".to_string()
            } else {
                bot.channels.join(", ")
            },
            flag(bot.create),
            flag(bot.auto_connect)
        );
    }
    println!();

    config.validate().context("config is not valid")?;
    println!("  {} config is valid", "✓".green());
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_check_valid_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "bots:\n  a:\n    user: u\n    token: t\n    channels: ['#c']\n    create: true"
        )
        .unwrap();
        assert!(run(Some(file.path())).is_ok());
    }

    #[test]
    fn test_check_missing_credentials_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bots:\n  a:\n    user: u\n    create: true").unwrap();
        assert!(run(Some(file.path())).is_err());
    }

    #[test]
    fn test_check_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run(Some(&dir.path().join("nope.yml"))).is_err());
    }
}
