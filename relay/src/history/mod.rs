//! Conversation history for the relay
//!
//! Each conversation is an append-only log of turns keyed by a conversation
//! identifier. The `HistoryStore` trait is implemented by an in-memory adapter
//! and a SQLite-backed adapter.

pub mod adapters;
pub mod store;

pub use adapters::{InMemoryHistoryStore, SqliteHistoryStore};
pub use store::{ConversationRecord, HistoryError, HistoryStore, HistoryStoreRef};
