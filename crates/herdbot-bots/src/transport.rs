//! Transport trait: the abstract chat-service client a bot drives.
//!
//! A transport owns the actual network session. Bots only ever:
//! - `connect()` / `disconnect()` the session
//! - `say()` into a channel
//! - `subscribe()` / `unsubscribe()` an event sink for one `EventKind`
//!
//! Events are delivered as `TransportEvent`s over a bounded `mpsc` sink, so
//! each bot consumes its own events on its own task.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use herdbot_core::config::BotConfig;

/// Capacity of the per-listen-cycle event queue.
pub const EVENT_BUFFER: usize = 64;

/// Handle returned by `subscribe`, used to unsubscribe.
pub type SubscriptionId = u64;

/// Receiving end of a subscription.
pub type EventSink = mpsc::Sender<TransportEvent>;

// ─────────────────────────────────────────────
// Wire-level values
// ─────────────────────────────────────────────

/// Server endpoint reported by connect / disconnect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub server: String,
    pub port: u16,
}

impl ConnectionInfo {
    pub fn new(server: impl Into<String>, port: u16) -> Self {
        Self {
            server: server.into(),
            port,
        }
    }
}

/// Result of a successful `say`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentMessage {
    pub channel: String,
    pub message: String,
}

/// Kind of chat line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Chat,
    Action,
    Whisper,
}

/// What the service tells us about the author of a message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderState {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub message_type: MessageType,
    /// Raw service tags (badges, ids, colors, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

impl SenderState {
    /// A plain chat sender.
    pub fn chat(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, message_type: MessageType) -> Self {
        self.message_type = message_type;
        self
    }
}

/// An inbound chat line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub channel: String,
    pub sender: SenderState,
    pub text: String,
    /// Sent by the bot's own account.
    pub is_self: bool,
}

impl ChatMessage {
    pub fn new(channel: impl Into<String>, sender: SenderState, text: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            sender,
            text: text.into(),
            is_self: false,
        }
    }

    pub fn from_self(mut self) -> Self {
        self.is_self = true;
        self
    }
}

// ─────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────

/// Event families a bot can subscribe to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Connected,
    Disconnected,
    Message,
}

/// An event pushed by the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// The session is (re-)established.
    Connected { address: String, port: u16 },
    /// The session dropped.
    Disconnected { reason: String },
    /// A chat line arrived.
    Message(ChatMessage),
}

impl TransportEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            TransportEvent::Connected { .. } => EventKind::Connected,
            TransportEvent::Disconnected { .. } => EventKind::Disconnected,
            TransportEvent::Message(_) => EventKind::Message,
        }
    }
}

// ─────────────────────────────────────────────
// Transport
// ─────────────────────────────────────────────

/// Every chat-service client implements this trait.
///
/// `Bot` holds an `Arc<dyn Transport>` and drives it through its lifecycle.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the session.
    async fn connect(&self) -> anyhow::Result<ConnectionInfo>;

    /// Close the session.
    async fn disconnect(&self) -> anyhow::Result<ConnectionInfo>;

    /// Send a message to a channel.
    async fn say(&self, channel: &str, message: &str) -> anyhow::Result<SentMessage>;

    /// Register `sink` for every future event of `kind`.
    fn subscribe(&self, kind: EventKind, sink: EventSink) -> SubscriptionId;

    /// Drop a registration. Returns `false` if `id` was unknown.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    /// Whether the transport re-establishes dropped sessions by itself.
    fn reconnects(&self) -> bool {
        false
    }
}

/// Builds one transport per bot.
pub trait TransportFactory: Send + Sync {
    fn create(&self, bot_name: &str, config: &BotConfig) -> anyhow::Result<Arc<dyn Transport>>;
}

// ─────────────────────────────────────────────
// EventHub
// ─────────────────────────────────────────────

struct Subscriber {
    id: SubscriptionId,
    kind: EventKind,
    sink: EventSink,
}

/// Subscriber registry for transport implementations.
///
/// Transports embed one hub, forward `subscribe`/`unsubscribe` to it and
/// call `emit` for every event they produce.
#[derive(Default)]
pub struct EventHub {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, kind: EventKind, sink: EventSink) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.lock().push(Subscriber { id, kind, sink });
        debug!(id, ?kind, "subscribed");
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.lock();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() != before
    }

    /// Number of live registrations for `kind`.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.lock().iter().filter(|s| s.kind == kind).count()
    }

    /// Deliver `event` to every sink registered for its kind.
    ///
    /// Never waits on a slow subscriber: a chat message for a full sink is
    /// dropped with a warning, a lifecycle event is queued on its own task.
    /// Returns how many sinks accepted or queued it. Closed sinks are pruned.
    pub async fn emit(&self, event: TransportEvent) -> usize {
        let kind = event.kind();
        let targets: Vec<(SubscriptionId, EventSink)> = self
            .lock()
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| (s.id, s.sink.clone()))
            .collect();

        let mut delivered = 0;
        for (id, sink) in targets {
            match sink.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(event)) if kind != EventKind::Message => {
                    tokio::spawn(async move {
                        let _ = sink.send(event).await;
                    });
                    delivered += 1;
                }
                Err(TrySendError::Full(_)) => {
                    warn!(id, ?kind, "subscriber queue full, event dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(id, "pruning closed subscriber");
                    self.unsubscribe(id);
                }
            }
        }
        delivered
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
