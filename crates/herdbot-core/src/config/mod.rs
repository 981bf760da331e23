//! Configuration system: schema, loading, and env var overrides.
//!
//! # Usage
//! ```no_run
//! use herdbot_core::config;
//!
//! let cfg = config::load_config(None).expect("config.yml");
//! println!("Bots: {:?}", cfg.bot_names());
//! ```

pub mod loader;
pub mod schema;

// Re-export key types
pub use loader::{get_config_path, load_config, save_config};
pub use schema::{BotConfig, Config, MonitorConfig};
