//! Shared CLI helpers: banner and config path display.

use std::path::{Path, PathBuf};

use colored::Colorize;

use herdbot_core::config::get_config_path;

/// Config path from `-c`, or the default `./config.yml`.
pub fn config_path(arg: Option<&Path>) -> PathBuf {
    match arg {
        Some(path) => herdbot_core::utils::resolve_path(&path.to_string_lossy()),
        None => get_config_path(),
    }
}

/// Print the banner shown at startup.
pub fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");
    println!();
    println!("{}  v{}", "🐑 Herdbot".cyan().bold(), version.dimmed());
}

/// `✓` or a red note, for yes/no rows.
pub fn mark(ok: bool, missing: &str) -> String {
    if ok {
        "✓".green().to_string()
    } else {
        missing.red().to_string()
    }
}

/// Dimmed "yes"/"no".
pub fn flag(value: bool) -> String {
    if value {
        "yes".green().to_string()
    } else {
        "no".dimmed().to_string()
    }
}
