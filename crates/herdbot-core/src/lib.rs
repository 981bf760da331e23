//! Herdbot Core: configuration, event log sink, and the status monitor.
//!
//! This crate provides:
//! - **config**: `Config` schema and the YAML loader
//! - **eventlog**: `EventLog`: newline-delimited JSON event records
//! - **monitor**: `StatusMonitor`: cancellable periodic callback
//! - **utils**: path resolution and timestamps

pub mod config;
pub mod error;
pub mod eventlog;
pub mod monitor;
pub mod utils;

pub use config::Config;
pub use error::ConfigError;
pub use eventlog::EventLog;
pub use monitor::StatusMonitor;
