//! `herdbot init`: write a starter config.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use herdbot_core::config::{save_config, Config};

use crate::helpers;

/// Run the init command. An existing config is left alone.
pub fn run(config_arg: Option<&Path>) -> Result<()> {
    let path = helpers::config_path(config_arg);

    println!();
    println!("{}", "🐑 Herdbot: Setup".cyan().bold());
    println!();

    if path.exists() {
        println!("  {} config already exists at {}", "✓".green(), path.display());
    } else {
        save_config(&Config::example(), Some(&path))?;
        println!("  {} created config at {}", "✓".green(), path.display());
        println!();
        println!(
            "  Set credentials in the file or via {}",
            "HERDBOT_BOTS__<NAME>__TOKEN".bold()
        );
    }
    println!();
    Ok(())
}
