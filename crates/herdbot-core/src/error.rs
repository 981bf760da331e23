//! Error types shared by the configuration layer.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal configuration problems: the process cannot start with these.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to write config file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_yaml::Error),

    #[error("bot `{bot}` is missing required credentials (user and token)")]
    MissingCredentials { bot: String },

    #[error("monitor is enabled with intervalSecs 0")]
    InvalidMonitorInterval,
}
