use batchquery_orchestrator::BatchResult;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::image::ImageSnapshot;

/// Represents a message within the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique message id
    pub id: String,
    /// Role of the message sender
    pub role: MessageRole,
    /// Message content
    pub text: String,
    /// Images attached to a user message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<ImageSnapshot>>,
    /// Creation time, epoch millis
    pub timestamp: i64,
    /// Image this assistant message answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MessageStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Message role enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn display_name(self) -> &'static str {
        match self {
            MessageRole::User => "You",
            MessageRole::Assistant => "Assistant",
            MessageRole::System => "System",
        }
    }
}

/// Lifecycle of an assistant placeholder
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Loading,
    Done,
    Error,
}

impl ChatMessage {
    fn base(role: MessageRole, text: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            text,
            images: None,
            timestamp: Utc::now().timestamp_millis(),
            image_id: None,
            status: None,
            error: None,
        }
    }

    /// Create the user message for a submitted question
    pub fn user(text: impl Into<String>, images: Vec<ImageSnapshot>) -> Self {
        Self {
            images: Some(images),
            ..Self::base(MessageRole::User, text.into())
        }
    }

    /// Create a loading placeholder answering `image_id`
    pub fn placeholder(image_id: impl Into<String>) -> Self {
        Self {
            image_id: Some(image_id.into()),
            status: Some(MessageStatus::Loading),
            ..Self::base(MessageRole::Assistant, String::new())
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::base(MessageRole::System, text.into())
    }

    pub fn is_loading(&self) -> bool {
        self.status == Some(MessageStatus::Loading)
    }

    /// Apply a batch result to a loading placeholder. Returns `false` and
    /// leaves the message untouched if it is not a loading placeholder for
    /// the result's image.
    pub fn resolve(&mut self, result: &BatchResult) -> bool {
        if !self.is_loading() || self.image_id.as_deref() != Some(result.image_id()) {
            return false;
        }

        match result {
            BatchResult::Answer { answer, .. } => {
                self.text = answer.clone();
                self.status = Some(MessageStatus::Done);
                self.error = None;
            }
            BatchResult::Failure { error, .. } => {
                self.fail(error.clone());
            }
        }
        true
    }

    /// Move a loading placeholder to `error`.
    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        if !self.is_loading() {
            return false;
        }
        self.text.clear();
        self.status = Some(MessageStatus::Error);
        self.error = Some(error.into());
        true
    }
}
