//! Webhook relay between a LINE bot and a chat completion endpoint.
//!
//! Inbound text messages are stored per conversation, sent to the completion
//! endpoint together with recent history, and answered through the reply API.

pub mod coordinator;
pub mod history;
pub mod http_server;
pub mod reply;
pub mod webhook;

pub use coordinator::{RelayContext, TurnError, TurnOrchestrator, TurnOutcome};
