//! Bot: one chat-service session plus its message pipeline.
//!
//! Lifecycle operations (`connect`, `disconnect`, `listen`, `dontlisten`)
//! are serialized by a per-bot async lock, so two callers can never both
//! open a session or both register listeners. Counters and flags sit behind
//! a plain mutex that is never held across an `.await`.
//!
//! Each listen cycle subscribes three sinks (connected, disconnected,
//! message) and spawns one dispatcher task that consumes this bot's events
//! in order. A handler runs to completion before the next event is taken.
//!
//! Every operation absorbs its own failures: the event log gets an error
//! record and the caller gets `None`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{json, Value};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use herdbot_core::config::BotConfig;
use herdbot_core::EventLog;

use crate::error::BotError;
use crate::handler::MessageHandler;
use crate::state::{BotPhase, BotSnapshot, BotState};
use crate::transport::{
    ChatMessage, ConnectionInfo, EventKind, SentMessage, SubscriptionId, Transport,
    TransportEvent, EVENT_BUFFER,
};

// ─────────────────────────────────────────────
// Listeners
// ─────────────────────────────────────────────

/// Registrations made by one listen cycle, kept so `dontlisten` can undo
/// exactly what `listen` did.
struct Listeners {
    generation: u64,
    connected: SubscriptionId,
    disconnected: SubscriptionId,
    message: SubscriptionId,
    stop: Arc<Notify>,
    task: JoinHandle<()>,
}

// ─────────────────────────────────────────────
// Bot
// ─────────────────────────────────────────────

pub struct Bot {
    name: String,
    user: String,
    /// Normalized channel names (`#lowercase`).
    channels: Vec<String>,
    transport: Arc<dyn Transport>,
    handler: Arc<dyn MessageHandler>,
    log: EventLog,
    state: Mutex<BotState>,
    lifecycle: tokio::sync::Mutex<Option<Listeners>>,
    generations: AtomicU64,
}

impl std::fmt::Debug for Bot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bot")
            .field("name", &self.name)
            .field("user", &self.user)
            .field("channels", &self.channels)
            .field("phase", &self.phase())
            .finish()
    }
}

impl Bot {
    /// Create a bot in the `Idle` phase.
    ///
    /// Fails when `user` or `token` is missing. The token itself is only
    /// needed by the transport and is not kept here.
    pub fn new(
        name: impl Into<String>,
        config: &BotConfig,
        transport: Arc<dyn Transport>,
        handler: Arc<dyn MessageHandler>,
        log: EventLog,
    ) -> Result<Arc<Self>, BotError> {
        let name = name.into();
        if !config.has_credentials() {
            return Err(BotError::MissingCredentials(name));
        }

        let mut channels: Vec<String> = Vec::with_capacity(config.channels.len());
        for channel in config.channels.iter().map(|c| normalize_channel(c)) {
            if channel.len() > 1 && !channels.contains(&channel) {
                channels.push(channel);
            }
        }

        Ok(Arc::new(Self {
            name,
            user: config.user.clone(),
            channels,
            transport,
            handler,
            log,
            state: Mutex::new(BotState::new()),
            lifecycle: tokio::sync::Mutex::new(None),
            generations: AtomicU64::new(0),
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub fn phase(&self) -> BotPhase {
        self.state().phase()
    }

    pub fn is_connected(&self) -> bool {
        self.state().connected()
    }

    pub fn is_listening(&self) -> bool {
        self.state().listening()
    }

    /// Whether `channel` is one of the configured channels.
    pub fn has_channel(&self, channel: &str) -> bool {
        let channel = normalize_channel(channel);
        self.channels.iter().any(|c| *c == channel)
    }

    pub fn snapshot(&self) -> BotSnapshot {
        self.state().snapshot(&self.user, &self.channels)
    }

    // ── Lifecycle ──

    /// Open the session and start listening.
    ///
    /// No-op when already connected. A failed attempt leaves the bot `Idle`;
    /// retrying is up to the caller.
    pub async fn connect(self: &Arc<Self>) -> Option<ConnectionInfo> {
        let mut lifecycle = self.lifecycle.lock().await;

        if self.is_connected() {
            self.log("connect", "connection not started: already connected", Value::Null);
            return None;
        }

        self.state().mark_connecting();

        let info = match self.transport.connect().await {
            Ok(info) => info,
            Err(e) => {
                self.state().set_phase(BotPhase::Idle);
                self.error("connect", "connection not started: failed to connect", &e, Value::Null);
                return None;
            }
        };

        self.state().mark_connected();
        info!(bot = %self.name, server = %info.server, port = info.port, "bot connected");

        self.listen_locked(&mut lifecycle);

        self.log("connect", "connection started", json!(info));
        Some(info)
    }

    /// Stop listening, then close the session.
    ///
    /// No-op when not connected. If the transport refuses to close, the
    /// listeners are restored and the bot stays connected and usable, so
    /// the state keeps matching the live session and the call can be retried.
    pub async fn disconnect(self: &Arc<Self>) -> Option<ConnectionInfo> {
        let mut lifecycle = self.lifecycle.lock().await;

        if !self.is_connected() {
            self.log(
                "disconnect",
                "connection not terminated: already disconnected",
                Value::Null,
            );
            return None;
        }

        let was_listening = lifecycle.is_some();
        if was_listening {
            self.dontlisten_locked(&mut lifecycle);
        }

        self.state().set_phase(BotPhase::Disconnecting);

        let info = match self.transport.disconnect().await {
            Ok(info) => info,
            Err(e) => {
                self.state().set_phase(BotPhase::Connected);
                self.error(
                    "disconnect",
                    "connection not terminated: failed to disconnect",
                    &e,
                    Value::Null,
                );
                if was_listening {
                    self.listen_locked(&mut lifecycle);
                }
                return None;
            }
        };

        self.state().mark_disconnected();
        info!(bot = %self.name, "bot disconnected");

        self.log("disconnect", "connection terminated", json!(info));
        Some(info)
    }

    /// Register the event listeners. Returns `true` if it did.
    pub async fn listen(self: &Arc<Self>) -> bool {
        let mut lifecycle = self.lifecycle.lock().await;
        self.listen_locked(&mut lifecycle)
    }

    /// Remove the event listeners. Returns `true` if it did.
    pub async fn dontlisten(&self) -> bool {
        let mut lifecycle = self.lifecycle.lock().await;
        self.dontlisten_locked(&mut lifecycle)
    }

    fn listen_locked(self: &Arc<Self>, slot: &mut Option<Listeners>) -> bool {
        if slot.is_some() {
            self.log("listen", "listen not started: already listening", Value::Null);
            return false;
        }
        if !self.is_connected() {
            self.log("listen", "listen not started: not connected", Value::Null);
            return false;
        }

        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let connected = self.transport.subscribe(EventKind::Connected, tx.clone());
        let disconnected = self.transport.subscribe(EventKind::Disconnected, tx.clone());
        let message = self.transport.subscribe(EventKind::Message, tx);

        let stop = Arc::new(Notify::new());
        let task = tokio::spawn(Self::dispatch(
            Arc::clone(self),
            generation,
            rx,
            stop.clone(),
        ));

        *slot = Some(Listeners {
            generation,
            connected,
            disconnected,
            message,
            stop,
            task,
        });

        self.state().mark_listening();
        debug!(bot = %self.name, generation, "listening");
        true
    }

    fn dontlisten_locked(&self, slot: &mut Option<Listeners>) -> bool {
        let Some(listeners) = slot.take() else {
            self.log("dontlisten", "listen not stopped: not listening", Value::Null);
            return false;
        };

        for id in [listeners.connected, listeners.disconnected, listeners.message] {
            if !self.transport.unsubscribe(id) {
                warn!(bot = %self.name, id, "transport did not know subscription");
            }
        }
        // The dispatcher checks this before taking another event. It is not
        // awaited: dontlisten may run on the dispatcher itself.
        listeners.stop.notify_one();
        if listeners.task.is_finished() {
            debug!(bot = %self.name, "dispatcher already finished");
        }

        self.state().mark_not_listening();
        debug!(bot = %self.name, generation = listeners.generation, "stopped listening");
        true
    }

    // ── Messaging ──

    /// Send `message` to `channel`.
    ///
    /// Rejected (logged, `None`) when not connected, while a dropped session
    /// is being re-established, or when `channel` is not configured.
    pub async fn say(&self, channel: &str, message: &str) -> Option<SentMessage> {
        let channel = normalize_channel(channel);
        let context = json!({ "channel": channel, "message": message });

        let (connected, reconnecting) = {
            let state = self.state();
            (state.connected(), state.reconnecting())
        };

        if !connected {
            self.log("say", "message not sent: client not connected", context);
            return None;
        }
        if reconnecting {
            self.log("say", "message not sent: connection dropped, awaiting reconnect", context);
            return None;
        }
        if !self.channels.contains(&channel) {
            self.log("say", "message not sent: not connected to channel", context);
            return None;
        }

        match self.transport.say(&channel, message).await {
            Ok(sent) => {
                self.state().record_message_sent();
                self.log("say", "message sent to channel", context);
                Some(sent)
            }
            Err(e) => {
                self.error("say", "message not sent: failed to send", &e, context);
                None
            }
        }
    }

    // ── Event log ──

    pub fn event_log(&self) -> &EventLog {
        &self.log
    }

    /// Write a log record attributed to this bot.
    pub fn log(&self, action: &str, msg: &str, extra: Value) {
        self.state().record_log();
        self.log.log(action, msg, self.attribute(extra));
    }

    /// Write an error record attributed to this bot.
    pub fn error(&self, action: &str, msg: &str, err: &anyhow::Error, extra: Value) {
        self.state().record_error();
        self.log.error(action, msg, err, self.attribute(extra));
    }

    fn attribute(&self, extra: Value) -> Value {
        match extra {
            Value::Object(mut fields) => {
                fields
                    .entry("bot")
                    .or_insert_with(|| Value::String(self.name.clone()));
                Value::Object(fields)
            }
            Value::Null => json!({ "bot": self.name }),
            other => json!({ "bot": self.name, "data": other }),
        }
    }

    // ── Event handling ──

    async fn dispatch(
        bot: Arc<Bot>,
        generation: u64,
        mut events: mpsc::Receiver<TransportEvent>,
        stop: Arc<Notify>,
    ) {
        debug!(bot = %bot.name, generation, "event dispatcher started");

        loop {
            tokio::select! {
                biased;
                _ = stop.notified() => break,
                event = events.recv() => match event {
                    Some(TransportEvent::Message(message)) => bot.on_message(message).await,
                    Some(TransportEvent::Connected { address, port }) => {
                        bot.on_connected(&address, port)
                    }
                    Some(TransportEvent::Disconnected { reason }) => {
                        bot.on_disconnected(generation, &reason).await
                    }
                    None => break,
                },
            }
        }

        debug!(bot = %bot.name, generation, "event dispatcher stopped");
    }

    /// Inbound message: count it, then hand it to the handler and wait for it.
    pub(crate) async fn on_message(self: &Arc<Self>, message: ChatMessage) {
        if message.is_self {
            return;
        }

        self.state().record_message_seen();

        let ChatMessage {
            channel,
            sender,
            text,
            ..
        } = message;
        let context = json!({
            "channel": channel,
            "userstate": sender,
            "message": text,
        });
        self.log("onMessage", "message received", context.clone());

        let bot = Arc::clone(self);
        let handler = Arc::clone(&self.handler);
        let outcome = tokio::spawn(async move {
            handler.on_message(&bot, &channel, &sender, &text).await
        })
        .await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.error("onMessage", "message handler failed", &e, context);
            }
            Err(join_err) => {
                let e = if join_err.is_panic() {
                    anyhow::anyhow!("message handler panicked: {}", panic_message(join_err))
                } else {
                    anyhow::anyhow!("message handler was cancelled")
                };
                self.error("onMessage", "message handler failed", &e, context);
            }
        }
    }

    /// Session (re-)established by the transport.
    pub(crate) fn on_connected(&self, address: &str, port: u16) {
        let was_reconnecting = {
            let mut state = self.state();
            let was = state.reconnecting();
            state.mark_connected();
            was
        };
        let msg = if was_reconnecting {
            "connection re-established"
        } else {
            "connection confirmed"
        };
        self.log("onConnected", msg, json!({ "address": address, "port": port }));
    }

    /// Unexpected drop. A graceful `disconnect` unsubscribes first, so this
    /// only fires for sessions lost underneath us.
    pub(crate) async fn on_disconnected(&self, generation: u64, reason: &str) {
        let mut lifecycle = self.lifecycle.lock().await;

        let current = lifecycle.as_ref().map(|l| l.generation);
        if current != Some(generation) {
            debug!(bot = %self.name, generation, "ignoring drop from a finished listen cycle");
            return;
        }

        let err = anyhow::anyhow!("unexpectedly disconnected");
        if self.transport.reconnects() {
            self.state().mark_dropped();
            self.error(
                "onDisconnected",
                reason,
                &err,
                json!({ "reconnect": true }),
            );
        } else {
            self.dontlisten_locked(&mut lifecycle);
            self.state().mark_disconnected();
            self.error(
                "onDisconnected",
                reason,
                &err,
                json!({ "reconnect": false }),
            );
        }
    }

    fn state(&self) -> MutexGuard<'_, BotState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Canonical channel form: trimmed, lower-case, `#`-prefixed.
pub fn normalize_channel(channel: &str) -> String {
    let channel = channel.trim().to_lowercase();
    if channel.starts_with('#') {
        channel
    } else {
        format!("#{channel}")
    }
}

fn panic_message(err: tokio::task::JoinError) -> String {
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
