//! Herdbot Handlers: the message handlers bots are bound to by name.
//!
//! - **joke**: `JokeHandler`, which replies with a dad joke when asked

pub mod joke;

use std::sync::Arc;

use herdbot_bots::HandlerRegistry;

pub use joke::JokeHandler;

/// Name of the bot the joke handler is registered under.
pub const JOKE_BOT: &str = "badJokeBot";

/// Registry with every built-in handler. Bots without an entry get a no-op.
pub fn default_handlers() -> anyhow::Result<HandlerRegistry> {
    let registry = HandlerRegistry::new().with(JOKE_BOT, Arc::new(JokeHandler::new()?));
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_handlers() {
        let registry = default_handlers().unwrap();
        assert_eq!(registry.names(), vec![JOKE_BOT]);
        assert!(registry.get("someOtherBot").is_none());
    }
}
