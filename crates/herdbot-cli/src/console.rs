//! Console transport: drives bots from the terminal instead of a chat server.
//!
//! - `connect` / `disconnect` always succeed (`console:0`)
//! - `say` prints `[#channel] user: text` to stdout
//! - stdin lines `#channel nick: text` become inbound messages for every
//!   connected bot that joined `#channel`

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use herdbot_bots::bot::normalize_channel;
use herdbot_bots::transport::{EventSink, SubscriptionId};
use herdbot_bots::{
    ChatMessage, ConnectionInfo, EventHub, EventKind, SenderState, SentMessage, Transport,
    TransportEvent, TransportFactory,
};
use herdbot_core::config::BotConfig;

const CONSOLE_ADDRESS: &str = "console";

pub struct ConsoleTransport {
    user: String,
    channels: Vec<String>,
    connected: AtomicBool,
    reconnect: bool,
    hub: EventHub,
}

impl ConsoleTransport {
    pub fn new(config: &BotConfig) -> Self {
        Self {
            user: config.user.clone(),
            channels: config.channels.iter().map(|c| normalize_channel(c)).collect(),
            connected: AtomicBool::new(false),
            reconnect: config.reconnect,
            hub: EventHub::new(),
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Offer an inbound line to this transport. Returns `true` if it was
    /// delivered to at least one subscriber.
    pub async fn deliver(&self, line: &ConsoleLine) -> bool {
        if !self.is_connected() || !self.channels.contains(&line.channel) {
            return false;
        }
        let mut message = ChatMessage::new(
            line.channel.clone(),
            SenderState::chat(line.nick.clone()),
            line.text.clone(),
        );
        if line.nick.eq_ignore_ascii_case(&self.user) {
            message = message.from_self();
        }
        self.hub.emit(TransportEvent::Message(message)).await > 0
    }
}

#[async_trait]
impl Transport for ConsoleTransport {
    async fn connect(&self) -> anyhow::Result<ConnectionInfo> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(ConnectionInfo::new(CONSOLE_ADDRESS, 0))
    }

    async fn disconnect(&self) -> anyhow::Result<ConnectionInfo> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(ConnectionInfo::new(CONSOLE_ADDRESS, 0))
    }

    async fn say(&self, channel: &str, message: &str) -> anyhow::Result<SentMessage> {
        if !self.is_connected() {
            anyhow::bail!("console session is closed");
        }
        println!(
            "{} {}: {}",
            format!("[{channel}]").dimmed(),
            self.user.cyan().bold(),
            message
        );
        Ok(SentMessage {
            channel: channel.to_string(),
            message: message.to_string(),
        })
    }

    fn subscribe(&self, kind: EventKind, sink: EventSink) -> SubscriptionId {
        self.hub.subscribe(kind, sink)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.hub.unsubscribe(id)
    }

    fn reconnects(&self) -> bool {
        self.reconnect
    }
}

// ─────────────────────────────────────────────
// Factory + stdin pump
// ─────────────────────────────────────────────

/// Hands out console transports and keeps them for the stdin pump.
#[derive(Default)]
pub struct ConsoleFactory {
    transports: Mutex<Vec<Arc<ConsoleTransport>>>,
}

impl ConsoleFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn transports(&self) -> MutexGuard<'_, Vec<Arc<ConsoleTransport>>> {
        self.transports
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Route one parsed line to every matching transport.
    pub async fn route(&self, line: &ConsoleLine) -> usize {
        let targets: Vec<Arc<ConsoleTransport>> = self.transports().clone();
        let mut delivered = 0;
        for transport in targets {
            if transport.deliver(line).await {
                delivered += 1;
            }
        }
        delivered
    }

    /// Read stdin until EOF, routing each well-formed line.
    pub async fn pump_stdin(self: Arc<Self>) {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(raw)) => match ConsoleLine::parse(&raw) {
                    Some(line) => {
                        if self.route(&line).await == 0 {
                            debug!(channel = %line.channel, "no listening bot in channel");
                        }
                    }
                    None if raw.trim().is_empty() => {}
                    None => eprintln!("{}", "expected: #channel nick: message".yellow()),
                },
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "stdin read failed");
                    break;
                }
            }
        }
        info!("stdin closed");
    }
}

impl TransportFactory for ConsoleFactory {
    fn create(&self, bot_name: &str, config: &BotConfig) -> anyhow::Result<Arc<dyn Transport>> {
        let transport = Arc::new(ConsoleTransport::new(config));
        self.transports().push(transport.clone());
        debug!(bot = %bot_name, "console transport created");
        Ok(transport)
    }
}

/// One inbound stdin line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsoleLine {
    pub channel: String,
    pub nick: String,
    pub text: String,
}

impl ConsoleLine {
    /// Parse `#channel nick: text`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if !raw.starts_with('#') {
            return None;
        }
        let (channel, rest) = raw.split_once(char::is_whitespace)?;
        let (nick, text) = rest.trim_start().split_once(':')?;
        let nick = nick.trim();
        let text = text.trim();
        if channel.len() < 2 || nick.is_empty() || nick.contains(char::is_whitespace) || text.is_empty() {
            return None;
        }
        Some(Self {
            channel: normalize_channel(channel),
            nick: nick.to_string(),
            text: text.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn config(user: &str, channels: &[&str]) -> BotConfig {
        BotConfig {
            user: user.into(),
            token: "t".into(),
            channels: channels.iter().map(|c| c.to_string()).collect(),
            create: true,
            auto_connect: true,
            log_file: None,
            reconnect: false,
        }
    }

    #[test]
    fn test_parse_line() {
        let line = ConsoleLine::parse("#Lobby alice: tell me a joke").unwrap();
        assert_eq!(line.channel, "#lobby");
        assert_eq!(line.nick, "alice");
        assert_eq!(line.text, "tell me a joke");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(ConsoleLine::parse("lobby alice: hi").is_none());
        assert!(ConsoleLine::parse("#lobby alice hi").is_none());
        assert!(ConsoleLine::parse("#lobby alice:").is_none());
        assert!(ConsoleLine::parse("# alice: hi").is_none());
        assert!(ConsoleLine::parse("").is_none());
    }

    #[tokio::test]
    async fn test_connect_and_say() {
        let transport = ConsoleTransport::new(&config("bot", &["#c"]));
        assert!(transport.say("#c", "early").await.is_err());

        let info = transport.connect().await.unwrap();
        assert_eq!(info, ConnectionInfo::new("console", 0));
        let sent = transport.say("#c", "hi").await.unwrap();
        assert_eq!(sent.message, "hi");

        transport.disconnect().await.unwrap();
        assert!(transport.say("#c", "late").await.is_err());
    }

    #[tokio::test]
    async fn test_route_to_matching_channel() {
        let factory = ConsoleFactory::new();
        let a = factory.create("a", &config("bot_a", &["#one"])).unwrap();
        let b = factory.create("b", &config("bot_b", &["#two"])).unwrap();
        a.connect().await.unwrap();
        b.connect().await.unwrap();

        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        a.subscribe(EventKind::Message, tx_a);
        b.subscribe(EventKind::Message, tx_b);

        let line = ConsoleLine::parse("#one viewer: hello").unwrap();
        assert_eq!(factory.route(&line).await, 1);

        match rx_a.recv().await.unwrap() {
            TransportEvent::Message(msg) => {
                assert_eq!(msg.text, "hello");
                assert!(!msg.is_self);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_own_nick_marked_self() {
        let transport = ConsoleTransport::new(&config("bot", &["#c"]));
        transport.connect().await.unwrap();
        let (tx, mut rx) = mpsc::channel(4);
        transport.subscribe(EventKind::Message, tx);

        let line = ConsoleLine::parse("#c BOT: echo").unwrap();
        assert!(transport.deliver(&line).await);
        match rx.recv().await.unwrap() {
            TransportEvent::Message(msg) => assert!(msg.is_self),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_disconnected_transport_drops_lines() {
        let transport = ConsoleTransport::new(&config("bot", &["#c"]));
        let (tx, _rx) = mpsc::channel(4);
        transport.subscribe(EventKind::Message, tx);

        let line = ConsoleLine::parse("#c viewer: hi").unwrap();
        assert!(!transport.deliver(&line).await);
    }

    #[tokio::test]
    async fn test_backlogged_bot_does_not_stall_others() {
        let factory = ConsoleFactory::new();
        let a = factory.create("a", &config("bot_a", &["#one"])).unwrap();
        let b = factory.create("b", &config("bot_b", &["#two"])).unwrap();
        a.connect().await.unwrap();
        b.connect().await.unwrap();

        // Never drained
        let (tx_a, _rx_a) = mpsc::channel(1);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        a.subscribe(EventKind::Message, tx_a);
        b.subscribe(EventKind::Message, tx_b);

        let routing = async {
            factory.route(&ConsoleLine::parse("#one viewer: first").unwrap()).await;
            factory.route(&ConsoleLine::parse("#one viewer: second").unwrap()).await;
            factory.route(&ConsoleLine::parse("#two viewer: for b").unwrap()).await
        };
        let delivered = tokio::time::timeout(Duration::from_millis(500), routing)
            .await
            .unwrap();
        assert_eq!(delivered, 1);

        match tokio::time::timeout(Duration::from_millis(500), rx_b.recv()).await {
            Ok(Some(TransportEvent::Message(msg))) => assert_eq!(msg.text, "for b"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_reconnect_option_reaches_transport() {
        let plain = ConsoleTransport::new(&config("bot", &["#c"]));
        assert!(!plain.reconnects());

        let sticky = ConsoleTransport::new(&BotConfig {
            reconnect: true,
            ..config("bot", &["#c"])
        });
        assert!(sticky.reconnects());
    }
}
