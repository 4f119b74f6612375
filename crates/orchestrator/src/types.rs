use std::collections::HashSet;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::OrchestratorError;

/// One image as handed to a responder: identity, display name and content.
#[derive(Debug, Clone)]
pub struct BatchImage {
    pub id: String,
    pub name: String,
    pub media_type: String,
    pub bytes: Bytes,
}

impl BatchImage {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            media_type: media_type.into(),
            bytes: bytes.into(),
        }
    }
}

/// Outcome for a single image of a batch, keyed by the image id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum BatchResult {
    Answer { image_id: String, answer: String },
    Failure { image_id: String, error: String },
}

impl BatchResult {
    pub fn answer(image_id: impl Into<String>, answer: impl Into<String>) -> Self {
        Self::Answer {
            image_id: image_id.into(),
            answer: answer.into(),
        }
    }

    pub fn failure(image_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Failure {
            image_id: image_id.into(),
            error: error.into(),
        }
    }

    pub fn image_id(&self) -> &str {
        match self {
            Self::Answer { image_id, .. } | Self::Failure { image_id, .. } => image_id,
        }
    }

    pub fn is_answer(&self) -> bool {
        matches!(self, Self::Answer { .. })
    }
}

/// Which responder the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponderMode {
    Real,
    Simulated,
}

impl ResponderMode {
    pub fn from_toggle(use_real_model: bool) -> Self {
        if use_real_model {
            Self::Real
        } else {
            Self::Simulated
        }
    }

    /// Label used in diagnostic log lines.
    pub fn label(self) -> &'static str {
        match self {
            Self::Real => "OpenAI",
            Self::Simulated => "Mock",
        }
    }
}

/// Rejects batches that violate the responder contract. These are caller
/// bugs, not per-image failures.
pub fn validate_batch(images: &[BatchImage], prompt: &str) -> Result<(), OrchestratorError> {
    if prompt.trim().is_empty() {
        return Err(OrchestratorError::EmptyPrompt);
    }

    let mut seen = HashSet::with_capacity(images.len());
    for image in images {
        if !seen.insert(image.id.as_str()) {
            return Err(OrchestratorError::DuplicateImageId(image.id.clone()));
        }
    }

    Ok(())
}
