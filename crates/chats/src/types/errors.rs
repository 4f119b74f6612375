//! Error types for the chat session.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for chat operations
pub type ChatResult<T> = Result<T, ChatError>;

/// Main error type for the chat session
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Image not found: {id}")]
    ImageNotFound { id: String },

    #[error("You can upload up to {max} images.")]
    RegistryFull { max: usize },

    #[error("Failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ChatError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not found error for images
    pub fn image_not_found(id: impl Into<String>) -> Self {
        Self::ImageNotFound { id: id.into() }
    }

    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }
}
