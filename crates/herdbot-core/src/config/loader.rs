//! Config loader: reads `config.yml`, then applies env var overrides.
//!
//! # Loading precedence
//! 1. YAML file (default `./config.yml`)
//! 2. Environment variables `HERDBOT_<SECTION>__<FIELD>` (override YAML)
//!
//! Unlike a preferences file, a missing or broken config is fatal: there is
//! nothing useful to run without bot definitions.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::schema::Config;
use crate::error::ConfigError;

/// Default config file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.yml";

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::resolve_path(DEFAULT_CONFIG_FILE)
}

/// Load configuration from `path` (or the default path) + env vars.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);
    load_config_from_path(&config_path)
}

/// Load config from a specific file path.
fn load_config_from_path(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    debug!("Loading config from {}", path.display());

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let config = parse_config(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let config = apply_env_overrides(config);
    info!(bots = config.bots.len(), "config loaded from {}", path.display());
    Ok(config)
}

/// Parse YAML text into a `Config`. An empty document yields the defaults.
fn parse_config(content: &str) -> Result<Config, serde_yaml::Error> {
    if content.trim().is_empty() {
        return Ok(Config::default());
    }
    serde_yaml::from_str(content)
}

/// Save configuration to disk as YAML with camelCase keys.
pub fn save_config(config: &Config, path: Option<&Path>) -> Result<(), ConfigError> {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: config_path.clone(),
            source,
        })?;
    }

    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&config_path, yaml).map_err(|source| ConfigError::Write {
        path: config_path.clone(),
        source,
    })?;
    debug!("Config saved to {}", config_path.display());
    Ok(())
}

/// Apply environment variable overrides on top of a loaded config.
///
/// Env var format: `HERDBOT_<SECTION>__<FIELD>` (double underscore as delimiter).
///
/// Supported overrides:
/// - `HERDBOT_LOG_FILE` → `logFile`
/// - `HERDBOT_BOTS__<NAME>__USER` → `bots.<name>.user`
/// - `HERDBOT_BOTS__<NAME>__TOKEN` → `bots.<name>.token`
///
/// `<NAME>` is the bot name upper-cased with `-` replaced by `_`.
/// Only bots already present in the file are affected.
fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(val) = std::env::var("HERDBOT_LOG_FILE") {
        config.log_file = Some(val);
    }

    for (name, bot) in config.bots.iter_mut() {
        let key = env_key(name);
        if let Ok(val) = std::env::var(format!("HERDBOT_BOTS__{key}__USER")) {
            bot.user = val;
        }
        if let Ok(val) = std::env::var(format!("HERDBOT_BOTS__{key}__TOKEN")) {
            bot.token = val;
        }
    }

    config
}

/// Environment-variable form of a bot name.
fn env_key(name: &str) -> String {
    name.to_uppercase().replace('-', "_")
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp_yaml(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_missing_file_is_fatal() {
        let err = load_config_from_path(Path::new("/nonexistent/path/config.yml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_valid_yaml() {
        let file = write_temp_yaml(
            r##"
logFile: bots.log
bots:
  badJokeBot:
    user: bad_joke_bot
    token: oauth:abc
    channels:
      - "#bad_joke_bot"
    create: true
    autoConnect: false
"##,
        );

        let config = load_config_from_path(file.path()).unwrap();
        assert_eq!(config.log_file.as_deref(), Some("bots.log"));
        let bot = config.bot("badJokeBot").unwrap();
        assert_eq!(bot.user, "bad_joke_bot");
        assert_eq!(bot.channels, vec!["#bad_joke_bot"]);
        assert!(bot.create);
        assert!(!bot.auto_connect);
    }

    #[test]
    fn test_load_invalid_yaml_is_fatal() {
        let file = write_temp_yaml("bots: [this is: not {valid");
        let err = load_config_from_path(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_load_empty_file_gives_defaults() {
        let file = write_temp_yaml("");
        let config = load_config_from_path(file.path()).unwrap();
        assert!(config.bots.is_empty());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yml");

        let config = Config::example();
        save_config(&config, Some(&path)).unwrap();

        let reloaded = load_config_from_path(&path).unwrap();
        assert_eq!(reloaded.bots, config.bots);
    }

    #[test]
    fn test_saved_yaml_uses_camel_case() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");

        save_config(&Config::example(), Some(&path)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("autoConnect"));
        assert!(!content.contains("auto_connect"));
    }

    #[test]
    fn test_env_override_token() {
        let file = write_temp_yaml(
            r#"
bots:
  env-test-bot:
    user: someone
    token: from-file
"#,
        );
        std::env::set_var("HERDBOT_BOTS__ENV_TEST_BOT__TOKEN", "from-env");
        let config = load_config_from_path(file.path()).unwrap();
        std::env::remove_var("HERDBOT_BOTS__ENV_TEST_BOT__TOKEN");

        assert_eq!(config.bot("env-test-bot").unwrap().token, "from-env");
        assert_eq!(config.bot("env-test-bot").unwrap().user, "someone");
    }

    #[test]
    fn test_env_key() {
        assert_eq!(env_key("badJokeBot"), "BADJOKEBOT");
        assert_eq!(env_key("my-bot"), "MY_BOT");
    }
}
