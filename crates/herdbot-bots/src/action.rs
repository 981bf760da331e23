//! Bot actions: the closed set of operations `Manager::exec` can run.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::bot::Bot;
use crate::error::ManagerError;
use crate::state::BotSnapshot;
use crate::transport::{ConnectionInfo, SentMessage};

/// Names accepted by [`BotAction::parse`], in display order.
pub const ACTION_NAMES: [&str; 6] = ["connect", "disconnect", "listen", "dontlisten", "say", "status"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotAction {
    Connect,
    Disconnect,
    Listen,
    DontListen,
    Say { channel: String, message: String },
    Status,
}

impl BotAction {
    pub fn name(&self) -> &'static str {
        match self {
            BotAction::Connect => "connect",
            BotAction::Disconnect => "disconnect",
            BotAction::Listen => "listen",
            BotAction::DontListen => "dontlisten",
            BotAction::Say { .. } => "say",
            BotAction::Status => "status",
        }
    }

    /// Build an action from its name and positional arguments.
    ///
    /// `say` takes `channel` and `message`; extra words are joined into the
    /// message. Every other action takes none.
    pub fn parse(name: &str, args: &[String]) -> Result<Self, ManagerError> {
        let action = match name.trim().to_lowercase().as_str() {
            "connect" => BotAction::Connect,
            "disconnect" => BotAction::Disconnect,
            "listen" => BotAction::Listen,
            "dontlisten" => BotAction::DontListen,
            "status" => BotAction::Status,
            "say" => {
                if args.len() < 2 {
                    return Err(ManagerError::InvalidArguments {
                        action: "say".into(),
                        expected: 2,
                        got: args.len(),
                    });
                }
                return Ok(BotAction::Say {
                    channel: args[0].clone(),
                    message: args[1..].join(" "),
                });
            }
            _ => {
                return Err(ManagerError::UnknownAction {
                    action: name.to_string(),
                    expected: ACTION_NAMES.join(", "),
                })
            }
        };

        if !args.is_empty() {
            return Err(ManagerError::InvalidArguments {
                action: action.name().into(),
                expected: 0,
                got: args.len(),
            });
        }
        Ok(action)
    }

    /// Run against `bot`. `None` means the bot declined (already logged).
    pub async fn run(self, bot: &Arc<Bot>) -> Option<ActionOutput> {
        match self {
            BotAction::Connect => bot.connect().await.map(ActionOutput::Connected),
            BotAction::Disconnect => bot.disconnect().await.map(ActionOutput::Disconnected),
            BotAction::Listen => bot.listen().await.then_some(ActionOutput::Listening),
            BotAction::DontListen => bot.dontlisten().await.then_some(ActionOutput::NotListening),
            BotAction::Say { channel, message } => {
                bot.say(&channel, &message).await.map(ActionOutput::Sent)
            }
            BotAction::Status => Some(ActionOutput::Status(bot.snapshot())),
        }
    }
}

impl fmt::Display for BotAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a successful action produced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "data", rename_all = "camelCase")]
pub enum ActionOutput {
    Connected(ConnectionInfo),
    Disconnected(ConnectionInfo),
    Listening,
    NotListening,
    Sent(SentMessage),
    Status(BotSnapshot),
}
