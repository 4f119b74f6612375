//! Ordered message log and batch reconciliation.

use batchquery_orchestrator::BatchResult;
use tracing::warn;

use crate::entities::{ChatMessage, ImageSnapshot};

pub const UNMATCHED_PLACEHOLDER_MESSAGE: &str = "No result was returned for this image.";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Placeholders moved to `done`.
    pub answered: usize,
    /// Placeholders moved to `error`.
    pub failed: usize,
    /// Placeholder ids with no matching result.
    pub unmatched: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ConversationLog {
    messages: Vec<ChatMessage>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push(&mut self, message: ChatMessage) -> String {
        let id = message.id.clone();
        self.messages.push(message);
        id
    }

    pub fn push_user(&mut self, text: impl Into<String>, images: Vec<ImageSnapshot>) -> String {
        self.push(ChatMessage::user(text, images))
    }

    /// Append one loading placeholder per image id; returns the placeholder
    /// message ids in the same order.
    pub fn push_placeholders<'a>(&mut self, image_ids: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        image_ids
            .into_iter()
            .map(|image_id| self.push(ChatMessage::placeholder(image_id)))
            .collect()
    }

    pub fn get(&self, message_id: &str) -> Option<&ChatMessage> {
        self.messages.iter().find(|message| message.id == message_id)
    }

    /// Resolve the given placeholders from a settled batch, matching by
    /// image id. The first result for an image wins.
    pub fn apply_results(&mut self, placeholder_ids: &[String], results: &[BatchResult]) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        for message in self
            .messages
            .iter_mut()
            .filter(|message| placeholder_ids.contains(&message.id))
        {
            if !message.is_loading() {
                continue;
            }

            let matched = message
                .image_id
                .as_deref()
                .and_then(|image_id| results.iter().find(|result| result.image_id() == image_id));

            match matched {
                Some(result) => {
                    if message.resolve(result) {
                        if result.is_answer() {
                            report.answered += 1;
                        } else {
                            report.failed += 1;
                        }
                    }
                }
                None => report.unmatched.push(message.id.clone()),
            }
        }

        report
    }

    /// Move any of the given placeholders still loading to `error`.
    pub fn fail_pending(&mut self, placeholder_ids: &[String], error: &str) -> usize {
        let mut failed = 0;
        for message in self
            .messages
            .iter_mut()
            .filter(|message| placeholder_ids.contains(&message.id))
        {
            if message.fail(error) {
                warn!(
                    message_id = %message.id,
                    image_id = message.image_id.as_deref().unwrap_or_default(),
                    "placeholder closed without a result"
                );
                failed += 1;
            }
        }
        failed
    }
}
