//! Configuration schema: the typed snapshot of `config.yml`.
//!
//! Hierarchy: `Config` → `MonitorConfig`, `BotConfig` (one per bot name).
//!
//! YAML on disk uses **camelCase** keys; Rust uses snake_case.
//! We use `#[serde(rename_all = "camelCase")]` to handle the conversion.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration: loaded once at startup and never mutated afterwards.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Global event log file. `None` = stdout/stderr.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,
    /// Periodic status monitor.
    pub monitor: MonitorConfig,
    /// Bot definitions, keyed by bot name.
    pub bots: BTreeMap<String, BotConfig>,
}

impl Config {
    /// Look up a bot definition by name.
    pub fn bot(&self, name: &str) -> Option<&BotConfig> {
        self.bots.get(name)
    }

    /// Names of all configured bots, in sorted order.
    pub fn bot_names(&self) -> Vec<String> {
        self.bots.keys().cloned().collect()
    }

    /// Reject configurations that cannot start.
    ///
    /// An enabled monitor needs a non-zero interval, and every bot marked
    /// `create: true` must carry both a user and a token.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.monitor.enabled && self.monitor.interval_secs == 0 {
            return Err(ConfigError::InvalidMonitorInterval);
        }
        for (name, bot) in &self.bots {
            if bot.create && !bot.has_credentials() {
                return Err(ConfigError::MissingCredentials { bot: name.clone() });
            }
        }
        Ok(())
    }

    /// A small example configuration written by `herdbot init`.
    pub fn example() -> Self {
        let mut bots = BTreeMap::new();
        bots.insert(
            "badJokeBot".to_string(),
            BotConfig {
                user: "bad_joke_bot".to_string(),
                token: "oauth:changeme".to_string(),
                channels: vec!["#bad_joke_bot".to_string()],
                create: true,
                auto_connect: true,
                log_file: None,
                reconnect: false,
            },
        );
        Self {
            log_file: Some("logs/herdbot.log".to_string()),
            monitor: MonitorConfig::default(),
            bots,
        }
    }
}

// ─────────────────────────────────────────────
// Monitor
// ─────────────────────────────────────────────

/// Periodic status heartbeat settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MonitorConfig {
    pub enabled: bool,
    /// Seconds between two status snapshots.
    pub interval_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 60,
        }
    }
}

// ─────────────────────────────────────────────
// Bots
// ─────────────────────────────────────────────

/// Definition of a single bot account.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BotConfig {
    /// Account name used to log in.
    pub user: String,
    /// Credential (e.g. `oauth:...`).
    pub token: String,
    /// Channels to join.
    pub channels: Vec<String>,
    /// Whether the manager instantiates this bot at startup.
    pub create: bool,
    /// Whether the bot connects right after creation.
    pub auto_connect: bool,
    /// Per-bot event log file. `None` = share the global sink.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,
    /// Ask the transport to reconnect on its own after a drop.
    pub reconnect: bool,
}

impl BotConfig {
    /// Whether both `user` and `token` are present.
    pub fn has_credentials(&self) -> bool {
        !self.user.trim().is_empty() && !self.token.trim().is_empty()
    }
}
