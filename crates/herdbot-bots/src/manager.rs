//! Manager: owns every bot and routes commands to them.
//!
//! Responsibilities:
//! - Create bots from configuration, binding the handler registered per name
//! - Fire-and-forget auto-connect for bots that ask for it
//! - Dispatch typed actions to a named bot (`exec`)
//! - Report state snapshots, one bot or all
//! - Run the optional status monitor
//!
//! Bots never surface errors to the manager. The manager's own failures
//! (unknown bot, duplicate name, bad action) go to its event log and, where
//! the caller can act on them, back as `ManagerError`.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use herdbot_core::monitor::OnTickFn;
use herdbot_core::{Config, EventLog, StatusMonitor};

use crate::action::{ActionOutput, BotAction};
use crate::bot::Bot;
use crate::error::ManagerError;
use crate::handler::HandlerRegistry;
use crate::state::BotSnapshot;
use crate::transport::TransportFactory;

/// Outcome of a successful `create`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// The bot is configured with `create: false`.
    Skipped,
}

struct MonitorTask {
    monitor: Arc<StatusMonitor>,
    task: JoinHandle<()>,
}

// ─────────────────────────────────────────────
// Manager
// ─────────────────────────────────────────────

pub struct Manager {
    config: Arc<Config>,
    bots: RwLock<BTreeMap<String, Arc<Bot>>>,
    handlers: HandlerRegistry,
    transports: Arc<dyn TransportFactory>,
    log: EventLog,
    monitor: Mutex<Option<MonitorTask>>,
}

impl Manager {
    /// Empty manager. The event log follows `config.log_file`.
    pub fn new(
        config: Config,
        transports: Arc<dyn TransportFactory>,
        handlers: HandlerRegistry,
    ) -> Arc<Self> {
        let log = EventLog::from_config(config.log_file.as_deref());
        Self::with_event_log(config, transports, handlers, log)
    }

    pub fn with_event_log(
        config: Config,
        transports: Arc<dyn TransportFactory>,
        handlers: HandlerRegistry,
        log: EventLog,
    ) -> Arc<Self> {
        Arc::new(Self {
            config: Arc::new(config),
            bots: RwLock::new(BTreeMap::new()),
            handlers,
            transports,
            log,
            monitor: Mutex::new(None),
        })
    }

    /// Build a manager, create every configured bot and start the monitor
    /// if the configuration enables it. Must run inside a tokio runtime.
    pub fn launch(
        config: Config,
        transports: Arc<dyn TransportFactory>,
        handlers: HandlerRegistry,
    ) -> Arc<Self> {
        let manager = Self::new(config, transports, handlers);
        manager.create_all();
        let monitor = manager.config.monitor.clone();
        if monitor.enabled {
            manager.start_monitor(Duration::from_secs(monitor.interval_secs));
        }
        manager
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn event_log(&self) -> &EventLog {
        &self.log
    }

    // ── Creation ──

    /// Create the bot configured under `name`.
    ///
    /// An existing bot is never replaced: the attempt is logged and rejected.
    /// Auto connect runs on the current tokio runtime; without one the bot
    /// is still created and the skipped connect is logged as an error.
    pub fn create(&self, name: &str) -> Result<CreateOutcome, ManagerError> {
        if self.has(name) {
            return Err(self.reject_duplicate(name));
        }

        let Some(bot_config) = self.config.bot(name) else {
            let err = ManagerError::UnknownBot(name.to_string());
            return Err(self.report_err("create", "bot not configured", err, name));
        };

        if !bot_config.create {
            self.log.log("create", "skipping bot creation", json!({ "bot": name }));
            return Ok(CreateOutcome::Skipped);
        }

        self.log.log("create", "creating bot", json!({ "bot": name }));

        let transport = match self.transports.create(name, bot_config) {
            Ok(transport) => transport,
            Err(e) => {
                let err = ManagerError::Transport {
                    bot: name.to_string(),
                    message: format!("{e:#}"),
                };
                return Err(self.report_err("create", "failed to create bot", err, name));
            }
        };

        let bot_log = match bot_config.log_file.as_deref() {
            Some(path) if !path.trim().is_empty() => EventLog::from_config(Some(path)),
            _ => self.log.clone(),
        };

        let bot = match Bot::new(name, bot_config, transport, self.handlers.resolve(name), bot_log) {
            Ok(bot) => bot,
            Err(e) => {
                return Err(self.report_err("create", "failed to create bot", e.into(), name));
            }
        };

        {
            let mut bots = self.write_bots();
            if bots.contains_key(name) {
                drop(bots);
                return Err(self.reject_duplicate(name));
            }
            bots.insert(name.to_string(), Arc::clone(&bot));
        }
        info!(bot = %name, channels = ?bot.channels(), "bot created");

        if bot_config.auto_connect {
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    self.log.log("create", "auto connecting", json!({ "bot": name }));
                    runtime.spawn(async move {
                        bot.connect().await;
                    });
                }
                Err(e) => {
                    self.log.error(
                        "create",
                        "auto connect skipped: no async runtime",
                        &anyhow::Error::new(e),
                        json!({ "bot": name }),
                    );
                }
            }
        } else {
            self.log.log("create", "skipping auto connect", json!({ "bot": name }));
        }

        Ok(CreateOutcome::Created)
    }

    /// Create every configured bot, in name order. Failures are logged and
    /// do not stop the rest. Returns the names that were created.
    ///
    /// Same runtime requirement as [`Manager::create`].
    pub fn create_all(&self) -> Vec<String> {
        let mut created = Vec::new();
        for name in self.config.bot_names() {
            match self.create(&name) {
                Ok(CreateOutcome::Created) => created.push(name),
                Ok(CreateOutcome::Skipped) => {}
                Err(e) => warn!(bot = %name, error = %e, "bot not created"),
            }
        }
        info!(count = created.len(), "bots created");
        created
    }

    // ── Lookup ──

    pub fn has(&self, name: &str) -> bool {
        self.read_bots().contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Bot>> {
        self.read_bots().get(name).cloned()
    }

    /// Names of the active bots, sorted.
    pub fn names(&self) -> Vec<String> {
        self.read_bots().keys().cloned().collect()
    }

    // ── Commands ──

    /// Run `action` on the bot called `name`.
    ///
    /// `None` when the bot does not exist or declined the action; either
    /// way the reason is in the event log.
    pub async fn exec(&self, name: &str, action: BotAction) -> Option<ActionOutput> {
        let Some(bot) = self.get(name) else {
            self.log.log(
                "exec",
                "bot does not exist",
                json!({ "bot": name, "command": action.name() }),
            );
            return None;
        };
        debug!(bot = %name, action = %action, "exec");
        action.run(&bot).await
    }

    /// String form of [`Manager::exec`]: parse `action` with `args` first.
    pub async fn exec_named(
        &self,
        name: &str,
        action: &str,
        args: &[String],
    ) -> Result<Option<ActionOutput>, ManagerError> {
        if !self.has(name) {
            self.log.log(
                "exec",
                "bot does not exist",
                json!({ "bot": name, "command": action }),
            );
            return Ok(None);
        }

        let action = match BotAction::parse(action, args) {
            Ok(action) => action,
            Err(e) => {
                return Err(self.report_err("exec", "invalid command", e, name));
            }
        };
        Ok(self.exec(name, action).await)
    }

    /// Snapshot of one bot. Logged and `None` when it does not exist.
    pub fn status(&self, name: &str) -> Option<BotSnapshot> {
        match self.get(name) {
            Some(bot) => Some(bot.snapshot()),
            None => {
                self.log.log("status", "bot does not exist", json!({ "bot": name }));
                None
            }
        }
    }

    /// Snapshot of every active bot, keyed by name.
    pub fn status_all(&self) -> BTreeMap<String, BotSnapshot> {
        self.read_bots()
            .iter()
            .map(|(name, bot)| (name.clone(), bot.snapshot()))
            .collect()
    }

    // ── Monitor ──

    /// Log `status_all` every `interval`. Returns `false` if already running.
    pub fn start_monitor(self: &Arc<Self>, interval: Duration) -> bool {
        let mut slot = self.monitor_slot();
        if slot.is_some() {
            debug!("status monitor already running");
            return false;
        }

        let manager: Weak<Manager> = Arc::downgrade(self);
        let on_tick: OnTickFn = Arc::new(move || {
            let manager = manager.clone();
            Box::pin(async move {
                if let Some(manager) = manager.upgrade() {
                    manager.log_status();
                }
            })
        });

        let monitor = Arc::new(StatusMonitor::new(on_tick, Some(interval)));
        let runner = Arc::clone(&monitor);
        let task = tokio::spawn(async move { runner.start().await });

        *slot = Some(MonitorTask { monitor, task });
        self.log.log(
            "monitor",
            "status monitor started",
            json!({ "intervalMs": interval.as_millis() as u64 }),
        );
        true
    }

    /// Stop the monitor and wait for its task. No-op when not running.
    pub async fn stop_monitor(&self) -> bool {
        let running = self.monitor_slot().take();
        let Some(MonitorTask { monitor, task }) = running else {
            return false;
        };
        monitor.stop();
        if let Err(e) = task.await {
            warn!(error = %e, "status monitor task ended abnormally");
        }
        self.log.log("monitor", "status monitor stopped", Value::Null);
        true
    }

    pub fn monitor_running(&self) -> bool {
        self.monitor_slot().is_some()
    }

    /// Write one status record covering every bot.
    pub fn log_status(&self) {
        self.log
            .log("monitor", "status", json!({ "bots": self.status_all() }));
    }

    // ── Teardown ──

    /// Stop the monitor, then disconnect every connected bot.
    pub async fn shutdown(&self) {
        info!("manager shutting down");
        self.stop_monitor().await;

        let bots: Vec<Arc<Bot>> = self.read_bots().values().cloned().collect();
        for bot in bots {
            if bot.is_connected() {
                bot.disconnect().await;
            }
        }
        self.log.log("shutdown", "all bots stopped", Value::Null);
    }

    // ── Internals ──

    fn reject_duplicate(&self, name: &str) -> ManagerError {
        self.report_err(
            "create",
            "bot already exists",
            ManagerError::AlreadyExists(name.to_string()),
            name,
        )
    }

    fn report_err(&self, action: &str, msg: &str, err: ManagerError, bot: &str) -> ManagerError {
        let reported = anyhow::anyhow!(err.to_string());
        self.log.error(action, msg, &reported, json!({ "bot": bot }));
        err
    }

    fn read_bots(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Arc<Bot>>> {
        self.bots
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_bots(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, Arc<Bot>>> {
        self.bots
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn monitor_slot(&self) -> MutexGuard<'_, Option<MonitorTask>> {
        self.monitor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
