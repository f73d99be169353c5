// Core chat-completion functionality shared by the relay daemon and tools:
// - Message model (roles, turns)
// - Completion API client and wire types
// - Configuration loading
// - Shared error types

// Export types module - Message model and completion wire format
pub mod types;
pub use types::*;

// Export client module - API client for the completion endpoint
pub mod client;
pub use client::*;

// Export config module - Configuration loading
pub mod config;
pub use config::*;

// Export errors module - Shared error types
pub mod errors;
pub use errors::*;
