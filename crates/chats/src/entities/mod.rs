//! Domain entities for the chat session.

pub mod image;
pub mod message;

pub use image::{ImageEntry, ImageFile, ImageSnapshot};
pub use message::{ChatMessage, MessageRole, MessageStatus};
