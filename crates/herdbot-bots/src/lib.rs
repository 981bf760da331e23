//! Herdbot Bots: the bot lifecycle state machine and the multi-bot manager.
//!
//! This crate provides:
//! - **transport**: `Transport` trait, event types, and `EventHub`
//! - **bot**: `Bot`, connect / listen / say / disconnect with contained failures
//! - **handler**: `MessageHandler` trait and the per-name `HandlerRegistry`
//! - **action**: `BotAction`, typed commands for `Manager::exec`
//! - **manager**: `Manager`, which creates, drives, and monitors bots

pub mod action;
pub mod bot;
pub mod error;
pub mod handler;
pub mod manager;
pub mod state;
pub mod transport;

#[cfg(test)]
mod testing;

pub use action::{ActionOutput, BotAction};
pub use bot::Bot;
pub use error::{BotError, ManagerError};
pub use handler::{HandlerRegistry, MessageHandler, NoopHandler};
pub use manager::{CreateOutcome, Manager};
pub use state::{BotPhase, BotSnapshot};
pub use transport::{
    ChatMessage, ConnectionInfo, EventHub, EventKind, MessageType, SenderState, SentMessage,
    Transport, TransportEvent, TransportFactory,
};
