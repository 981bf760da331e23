//! Message handler trait and the per-bot handler registry.
//!
//! A handler is the pluggable business logic of a bot. It runs with the
//! owning bot as context, so it can `say`, `log` and `error` through it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::bot::Bot;
use crate::transport::SenderState;

/// Invoked for every inbound message that was not sent by the bot itself.
///
/// Errors (and panics) are contained by the bot and logged with the
/// message context; they never reach the transport.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn on_message(
        &self,
        bot: &Bot,
        channel: &str,
        sender: &SenderState,
        message: &str,
    ) -> anyhow::Result<()>;
}

/// Handler that ignores everything.
pub struct NoopHandler;

#[async_trait]
impl MessageHandler for NoopHandler {
    async fn on_message(
        &self,
        _bot: &Bot,
        _channel: &str,
        _sender: &SenderState,
        _message: &str,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Handlers keyed by bot name.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn MessageHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Overwrites any previous handler for `bot_name`.
    pub fn register(&mut self, bot_name: impl Into<String>, handler: Arc<dyn MessageHandler>) {
        self.handlers.insert(bot_name.into(), handler);
    }

    /// Builder form of `register`.
    pub fn with(mut self, bot_name: impl Into<String>, handler: Arc<dyn MessageHandler>) -> Self {
        self.register(bot_name, handler);
        self
    }

    pub fn get(&self, bot_name: &str) -> Option<Arc<dyn MessageHandler>> {
        self.handlers.get(bot_name).cloned()
    }

    /// The handler for `bot_name`, or a `NoopHandler`.
    pub fn resolve(&self, bot_name: &str) -> Arc<dyn MessageHandler> {
        self.get(bot_name).unwrap_or_else(|| Arc::new(NoopHandler))
    }

    /// Registered bot names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
