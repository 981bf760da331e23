//! Joke handler: answers any chat line mentioning "joke" with a dad joke
//! from icanhazdadjoke.com.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use herdbot_bots::{Bot, MessageHandler, MessageType, SenderState};

/// Public joke API.
pub const JOKE_API_BASE: &str = "https://icanhazdadjoke.com";

/// Upper bound for one joke request.
pub const JOKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Keyword that triggers a reply.
const TRIGGER: &str = "joke";

#[derive(Debug, Deserialize)]
struct JokeResponse {
    status: u16,
    #[serde(default)]
    joke: String,
}

pub struct JokeHandler {
    client: reqwest::Client,
    api_base: String,
}

impl std::fmt::Debug for JokeHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JokeHandler")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl JokeHandler {
    /// Handler talking to the public API.
    pub fn new() -> reqwest::Result<Self> {
        Self::with_api_base(JOKE_API_BASE)
    }

    /// Handler talking to `api_base` instead (tests, mirrors).
    pub fn with_api_base(api_base: impl Into<String>) -> reqwest::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(JOKE_TIMEOUT)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    /// Fetch one joke. The API reports its own status in the body.
    pub async fn fetch_joke(&self) -> anyhow::Result<String> {
        let response = self.client.get(format!("{}/", self.api_base)).send().await?;
        let body: JokeResponse = response.json().await?;

        if body.status != 200 {
            anyhow::bail!("Error getting joke: status {}", body.status);
        }
        if body.joke.trim().is_empty() {
            anyhow::bail!("Error getting joke: empty joke");
        }
        Ok(body.joke)
    }
}

#[async_trait]
impl MessageHandler for JokeHandler {
    async fn on_message(
        &self,
        bot: &Bot,
        channel: &str,
        sender: &SenderState,
        message: &str,
    ) -> anyhow::Result<()> {
        if sender.message_type != MessageType::Chat || !message.contains(TRIGGER) {
            return Ok(());
        }

        debug!(bot = %bot.name(), channel, "fetching joke");
        match self.fetch_joke().await {
            Ok(joke) => {
                bot.say(channel, &joke).await;
            }
            Err(e) => {
                bot.error(
                    "onMessage",
                    "error getting joke",
                    &e,
                    json!({ "channel": channel, "userstate": sender, "message": message }),
                );
            }
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use herdbot_bots::transport::{EventSink, SubscriptionId};
    use herdbot_bots::{ConnectionInfo, EventHub, EventKind, SentMessage, Transport};
    use herdbot_core::config::BotConfig;
    use herdbot_core::EventLog;
    use std::sync::{Arc, Mutex};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct RecordingTransport {
        hub: EventHub,
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn connect(&self) -> anyhow::Result<ConnectionInfo> {
            Ok(ConnectionInfo::new("irc.test", 6667))
        }

        async fn disconnect(&self) -> anyhow::Result<ConnectionInfo> {
            Ok(ConnectionInfo::new("irc.test", 6667))
        }

        async fn say(&self, channel: &str, message: &str) -> anyhow::Result<SentMessage> {
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
            self.hub.unsubscribe(id)
        }
    }

    async fn connected_bot(handler: Arc<JokeHandler>) -> (Arc<Bot>, Arc<RecordingTransport>, EventLog) {
        let transport = Arc::new(RecordingTransport::default());
        let log = EventLog::memory();
        let config = BotConfig {
            user: "bad_joke_bot".into(),
            token: "oauth:t".into(),
            channels: vec!["#jokes".into()],
            create: true,
            auto_connect: false,
            log_file: None,
            reconnect: false,
        };
        let bot = Bot::new("badJokeBot", &config, transport.clone(), handler, log.clone()).unwrap();
        bot.connect().await.unwrap();
        (bot, transport, log)
    }

    async fn joke_server(body: serde_json::Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .and(header("Accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_fetch_joke_success() {
        let server = joke_server(json!({
            "id": "abc",
            "joke": "I'm reading a book about anti-gravity. It's impossible to put down.",
            "status": 200
        }))
        .await;

        let handler = JokeHandler::with_api_base(server.uri()).unwrap();
        let joke = handler.fetch_joke().await.unwrap();
        assert!(joke.contains("anti-gravity"));
    }

    #[tokio::test]
    async fn test_fetch_joke_bad_status_in_body() {
        let server = joke_server(json!({ "status": 429 })).await;
        let handler = JokeHandler::with_api_base(server.uri()).unwrap();

        let err = handler.fetch_joke().await.unwrap_err();
        assert_eq!(err.to_string(), "Error getting joke: status 429");
    }

    #[tokio::test]
    async fn test_empty_joke_is_an_error() {
        let server = joke_server(json!({ "status": 200 })).await;
        let handler = Arc::new(JokeHandler::with_api_base(server.uri()).unwrap());

        let err = handler.fetch_joke().await.unwrap_err();
        assert_eq!(err.to_string(), "Error getting joke: empty joke");

        let (bot, transport, log) = connected_bot(handler.clone()).await;
        handler
            .on_message(&bot, "#jokes", &SenderState::chat("viewer"), "joke")
            .await
            .unwrap();

        assert!(transport.sent.lock().unwrap().is_empty());
        let record = log
            .records()
            .into_iter()
            .find(|r| r["isError"] == true)
            .unwrap();
        assert_eq!(record["msg"], "error getting joke");
    }

    #[tokio::test]
    async fn test_replies_with_joke() {
        let server = joke_server(json!({ "joke": "Why did the crab never share?", "status": 200 })).await;
        let handler = Arc::new(JokeHandler::with_api_base(server.uri()).unwrap());
        let (bot, transport, _) = connected_bot(handler.clone()).await;

        handler
            .on_message(&bot, "#jokes", &SenderState::chat("viewer"), "tell me a joke")
            .await
            .unwrap();

        let sent = transport.sent.lock().unwrap().clone();
        assert_eq!(sent, vec![("#jokes".to_string(), "Why did the crab never share?".to_string())]);
    }

    #[tokio::test]
    async fn test_ignores_messages_without_keyword() {
        let server = MockServer::start().await;
        let handler = Arc::new(JokeHandler::with_api_base(server.uri()).unwrap());
        let (bot, transport, _) = connected_bot(handler.clone()).await;

        handler
            .on_message(&bot, "#jokes", &SenderState::chat("viewer"), "hello there")
            .await
            .unwrap();

        assert!(transport.sent.lock().unwrap().is_empty());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ignores_non_chat_messages() {
        let server = MockServer::start().await;
        let handler = Arc::new(JokeHandler::with_api_base(server.uri()).unwrap());
        let (bot, transport, _) = connected_bot(handler.clone()).await;

        let whisper = SenderState::chat("viewer").with_type(MessageType::Whisper);
        handler
            .on_message(&bot, "#jokes", &whisper, "joke please")
            .await
            .unwrap();

        assert!(transport.sent.lock().unwrap().is_empty());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_api_failure_logged_without_reply() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;
        let handler = Arc::new(JokeHandler::with_api_base(server.uri()).unwrap());
        let (bot, transport, log) = connected_bot(handler.clone()).await;

        handler
            .on_message(&bot, "#jokes", &SenderState::chat("viewer"), "joke")
            .await
            .unwrap();

        assert!(transport.sent.lock().unwrap().is_empty());
        let record = log
            .records()
            .into_iter()
            .find(|r| r["isError"] == true)
            .unwrap();
        assert_eq!(record["msg"], "error getting joke");
        assert_eq!(record["channel"], "#jokes");
        assert_eq!(record["userstate"]["username"], "viewer");
        assert_eq!(bot.snapshot().errors, 1);
    }
}
