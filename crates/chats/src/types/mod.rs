//! Shared types for the chat session.

pub mod errors;

pub use errors::{ChatError, ChatResult};
