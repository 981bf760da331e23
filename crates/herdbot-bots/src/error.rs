//! Error types for bot construction and manager operations.
//!
//! Transport and handler failures never show up here: a bot absorbs and
//! logs those itself and reports "did not proceed" as `None`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BotError {
    #[error("failed to create bot `{0}`: missing user or token")]
    MissingCredentials(String),
}

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("bot `{0}` is not configured")]
    UnknownBot(String),

    #[error("bot `{0}` already exists")]
    AlreadyExists(String),

    #[error("unknown action `{action}` (expected one of: {expected})")]
    UnknownAction { action: String, expected: String },

    #[error("action `{action}` expects {expected} argument(s), got {got}")]
    InvalidArguments {
        action: String,
        expected: usize,
        got: usize,
    },

    #[error("failed to create transport for bot `{bot}`: {message}")]
    Transport { bot: String, message: String },

    #[error(transparent)]
    Bot(#[from] BotError),
}
