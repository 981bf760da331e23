//! Test doubles: a scriptable transport, its factory, and a recording handler.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use herdbot_core::config::BotConfig;

use crate::bot::Bot;
use crate::handler::MessageHandler;
use crate::transport::{
    ConnectionInfo, EventHub, EventKind, EventSink, SenderState, SentMessage, SubscriptionId,
    Transport, TransportEvent, TransportFactory,
};

/// Transport that records calls and fails on request.
#[derive(Default)]
pub struct MockTransport {
    hub: EventHub,
    reconnect: bool,
    pub connect_calls: AtomicUsize,
    pub disconnect_calls: AtomicUsize,
    pub say_calls: AtomicUsize,
    pub unsubscribe_calls: AtomicUsize,
    pub fail_connect: AtomicBool,
    pub fail_disconnect: AtomicBool,
    pub fail_say: AtomicBool,
    pub connect_delay_ms: AtomicUsize,
    pub sent: Mutex<Vec<(String, String)>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reconnecting() -> Arc<Self> {
        Arc::new(Self {
            reconnect: true,
            ..Default::default()
        })
    }

    pub async fn emit(&self, event: TransportEvent) -> usize {
        self.hub.emit(event).await
    }

    pub fn subscribers(&self, kind: EventKind) -> usize {
        self.hub.subscriber_count(kind)
    }

    pub fn connects(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn says(&self) -> usize {
        self.say_calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self) -> anyhow::Result<ConnectionInfo> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.connect_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
        if self.fail_connect.load(Ordering::SeqCst) {
            anyhow::bail!("connection refused");
        }
        Ok(ConnectionInfo::new("irc.mock.tv", 6697))
    }

    async fn disconnect(&self) -> anyhow::Result<ConnectionInfo> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_disconnect.load(Ordering::SeqCst) {
            anyhow::bail!("socket stuck");
        }
        Ok(ConnectionInfo::new("irc.mock.tv", 6697))
    }

    async fn say(&self, channel: &str, message: &str) -> anyhow::Result<SentMessage> {
        self.say_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_say.load(Ordering::SeqCst) {
            anyhow::bail!("rate limited");
        }
        self.sent
            .lock()
            .unwrap()
            .push((channel.to_string(), message.to_string()));
        Ok(SentMessage {
            channel: channel.to_string(),
            message: message.to_string(),
        })
    }

    fn subscribe(&self, kind: EventKind, sink: EventSink) -> SubscriptionId {
        self.hub.subscribe(kind, sink)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.unsubscribe_calls.fetch_add(1, Ordering::SeqCst);
        self.hub.unsubscribe(id)
    }

    fn reconnects(&self) -> bool {
        self.reconnect
    }
}

/// Factory handing out one `MockTransport` per bot, kept for inspection.
#[derive(Default)]
pub struct MockFactory {
    pub transports: Mutex<HashMap<String, Arc<MockTransport>>>,
    pub fail: AtomicBool,
    pub fail_connect: AtomicBool,
}

impl MockFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn get(&self, bot_name: &str) -> Option<Arc<MockTransport>> {
        self.transports.lock().unwrap().get(bot_name).cloned()
    }

    pub fn created(&self) -> usize {
        self.transports.lock().unwrap().len()
    }
}

impl TransportFactory for MockFactory {
    fn create(&self, bot_name: &str, config: &BotConfig) -> anyhow::Result<Arc<dyn Transport>> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("no route to host");
        }
        let transport = if config.reconnect {
            MockTransport::reconnecting()
        } else {
            MockTransport::new()
        };
        if self.fail_connect.load(Ordering::SeqCst) {
            transport.fail_connect.store(true, Ordering::SeqCst);
        }
        self.transports
            .lock()
            .unwrap()
            .insert(bot_name.to_string(), transport.clone());
        Ok(transport)
    }
}

/// What the recording handler saw.
pub type Seen = Arc<Mutex<Vec<(String, String, String)>>>;

/// Handler that records every call.
///
/// - `"ping"` → replies `"pong"` through the bot
/// - `"fail"` → returns an error
/// - `"panic"` → panics
/// - `"slow"` → sleeps 50 ms first
#[derive(Default)]
pub struct RecordingHandler {
    pub seen: Seen,
}

impl RecordingHandler {
    pub fn new() -> (Arc<Self>, Seen) {
        let handler = Arc::new(Self::default());
        let seen = handler.seen.clone();
        (handler, seen)
    }
}

#[async_trait]
impl MessageHandler for RecordingHandler {
    async fn on_message(
        &self,
        bot: &Bot,
        channel: &str,
        sender: &SenderState,
        message: &str,
    ) -> anyhow::Result<()> {
        if message == "slow" {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        self.seen.lock().unwrap().push((
            channel.to_string(),
            sender.username.clone(),
            message.to_string(),
        ));
        match message {
            "ping" => {
                bot.say(channel, "pong").await;
                Ok(())
            }
            "fail" => anyhow::bail!("handler exploded"),
            "panic" => panic!("handler panicked on purpose"),
            _ => Ok(()),
        }
    }
}

pub fn bot_config(channels: &[&str]) -> BotConfig {
    BotConfig {
        user: "herd_bot".into(),
        token: "oauth:secret".into(),
        channels: channels.iter().map(|c| c.to_string()).collect(),
        create: true,
        auto_connect: false,
        log_file: None,
        reconnect: false,
    }
}

/// Poll `check` until it holds or two seconds pass.
pub async fn wait_until(check: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
