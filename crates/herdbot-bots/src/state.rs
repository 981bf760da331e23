//! Bot state: lifecycle phase, counters, and per-event timestamps.
//!
//! `phase` is the single source of truth for the connection flags:
//! `connected()` and `listening()` are derived from it, so "listening
//! implies connected" holds by construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a bot is in its connection lifecycle.
///
/// `Idle → Connecting → Connected → Listening → Disconnecting → Idle`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotPhase {
    #[default]
    Idle,
    Connecting,
    Connected,
    Listening,
    Disconnecting,
}

impl BotPhase {
    /// The transport session is up.
    pub fn is_connected(self) -> bool {
        matches!(
            self,
            BotPhase::Connected | BotPhase::Listening | BotPhase::Disconnecting
        )
    }

    pub fn is_listening(self) -> bool {
        self == BotPhase::Listening
    }
}

/// Last time each lifecycle event happened.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timestamps {
    pub init: Option<DateTime<Utc>>,
    pub connected: Option<DateTime<Utc>>,
    pub disconnected: Option<DateTime<Utc>>,
    pub message_seen: Option<DateTime<Utc>>,
    pub message_sent: Option<DateTime<Utc>>,
    pub error: Option<DateTime<Utc>>,
    pub log: Option<DateTime<Utc>>,
    pub listen: Option<DateTime<Utc>>,
    pub dontlisten: Option<DateTime<Utc>>,
}

/// Mutable state owned by one bot.
#[derive(Clone, Debug)]
pub struct BotState {
    phase: BotPhase,
    reconnecting: bool,
    messages_seen: u64,
    messages_sent: u64,
    logs: u64,
    errors: u64,
    time: Timestamps,
}

impl Default for BotState {
    fn default() -> Self {
        Self::new()
    }
}

impl BotState {
    pub fn new() -> Self {
        Self {
            phase: BotPhase::Idle,
            reconnecting: false,
            messages_seen: 0,
            messages_sent: 0,
            logs: 0,
            errors: 0,
            time: Timestamps {
                init: Some(Utc::now()),
                ..Default::default()
            },
        }
    }

    pub fn phase(&self) -> BotPhase {
        self.phase
    }

    pub fn connected(&self) -> bool {
        self.phase.is_connected()
    }

    pub fn listening(&self) -> bool {
        self.phase.is_listening()
    }

    /// Session dropped and the transport is expected to bring it back.
    pub fn reconnecting(&self) -> bool {
        self.reconnecting
    }

    pub fn time(&self) -> &Timestamps {
        &self.time
    }

    pub(crate) fn set_phase(&mut self, phase: BotPhase) {
        self.phase = phase;
    }

    pub(crate) fn mark_connecting(&mut self) {
        self.phase = BotPhase::Connecting;
    }

    pub(crate) fn mark_connected(&mut self) {
        if !self.phase.is_connected() {
            self.phase = BotPhase::Connected;
        }
        self.reconnecting = false;
        self.time.connected = Some(Utc::now());
    }

    pub(crate) fn mark_listening(&mut self) {
        self.phase = BotPhase::Listening;
        self.time.listen = Some(Utc::now());
    }

    pub(crate) fn mark_not_listening(&mut self) {
        if self.phase == BotPhase::Listening {
            self.phase = BotPhase::Connected;
        }
        self.reconnecting = false;
        self.time.dontlisten = Some(Utc::now());
    }

    pub(crate) fn mark_disconnected(&mut self) {
        self.phase = BotPhase::Idle;
        self.reconnecting = false;
        self.time.disconnected = Some(Utc::now());
    }

    /// Unexpected drop while the transport handles reconnection.
    pub(crate) fn mark_dropped(&mut self) {
        self.reconnecting = true;
        self.time.disconnected = Some(Utc::now());
    }

    pub(crate) fn record_message_seen(&mut self) {
        self.messages_seen = self.messages_seen.saturating_add(1);
        self.time.message_seen = Some(Utc::now());
    }

    pub(crate) fn record_message_sent(&mut self) {
        self.messages_sent = self.messages_sent.saturating_add(1);
        self.time.message_sent = Some(Utc::now());
    }

    pub(crate) fn record_log(&mut self) {
        self.logs = self.logs.saturating_add(1);
        self.time.log = Some(Utc::now());
    }

    pub(crate) fn record_error(&mut self) {
        self.errors = self.errors.saturating_add(1);
        self.time.error = Some(Utc::now());
    }

    /// Serializable copy of the current state.
    pub fn snapshot(&self, user: &str, channels: &[String]) -> BotSnapshot {
        BotSnapshot {
            user: user.to_string(),
            channels: channels.to_vec(),
            phase: self.phase,
            connected: self.connected(),
            listening: self.listening(),
            reconnecting: self.reconnecting,
            messages_seen: self.messages_seen,
            messages_sent: self.messages_sent,
            logs: self.logs,
            errors: self.errors,
            time: self.time.clone(),
        }
    }
}

/// Point-in-time view of a bot, as reported by `status`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotSnapshot {
    pub user: String,
    pub channels: Vec<String>,
    pub phase: BotPhase,
    pub connected: bool,
    pub listening: bool,
    pub reconnecting: bool,
    pub messages_seen: u64,
    pub messages_sent: u64,
    pub logs: u64,
    pub errors: u64,
    pub time: Timestamps,
}
