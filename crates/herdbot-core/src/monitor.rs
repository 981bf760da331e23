//! Status monitor: a cancellable periodic callback.
//!
//! The manager uses it to write a status snapshot of every bot on a fixed
//! interval. The loop runs until `stop()` is called; a stop issued before
//! the loop starts is remembered.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, info};

// ─────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────

/// Default interval: 60 seconds.
pub const DEFAULT_MONITOR_INTERVAL_S: u64 = 60;

// ─────────────────────────────────────────────
// Callback type
// ─────────────────────────────────────────────

/// Callback invoked on each monitor tick.
pub type OnTickFn = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

// ─────────────────────────────────────────────
// StatusMonitor
// ─────────────────────────────────────────────

/// Periodic tick driver with a shutdown signal.
pub struct StatusMonitor {
    /// Callback to invoke on every tick.
    on_tick: OnTickFn,
    /// Time between ticks.
    interval: Duration,
    /// Shutdown signal. `notify_one` keeps a permit, so an early stop wins.
    shutdown: Notify,
}

impl StatusMonitor {
    /// Create a new monitor. `interval` defaults to 60 s; zero is raised to 1 s.
    pub fn new(on_tick: OnTickFn, interval: Option<Duration>) -> Self {
        let interval = interval
            .unwrap_or(Duration::from_secs(DEFAULT_MONITOR_INTERVAL_S))
            .max(Duration::from_millis(1));
        Self {
            on_tick,
            interval,
            shutdown: Notify::new(),
        }
    }

    /// Time between ticks.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run the tick loop. Returns when `stop()` is called.
    pub async fn start(&self) {
        info!(interval_ms = self.interval.as_millis() as u64, "status monitor started");

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.notified() => {
                    info!("status monitor shutting down");
                    return;
                }
                _ = tokio::time::sleep(self.interval) => {
                    debug!("status monitor tick");
                    (self.on_tick)().await;
                }
            }
        }
    }

    /// Stop the tick loop.
    pub fn stop(&self) {
        info!("stopping status monitor");
        self.shutdown.notify_one();
    }

    /// Run the callback once, outside the loop.
    pub async fn trigger_now(&self) {
        (self.on_tick)().await;
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
