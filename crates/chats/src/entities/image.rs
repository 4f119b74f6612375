use std::path::Path;

use batchquery_orchestrator::BatchImage;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::preview_store::{PreviewLease, PreviewStore};
use crate::types::{ChatError, ChatResult};
use crate::utils::media::media_type_for_path;

/// A candidate file offered by the file picker.
#[derive(Debug, Clone)]
pub struct ImageFile {
    /// Original filename
    pub name: String,
    /// MIME type
    pub media_type: String,
    pub bytes: Bytes,
}

impl ImageFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, inferring its media type from the extension.
    pub async fn read(path: &Path) -> ChatResult<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ChatError::file_read(path, source))?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self::new(name, media_type_for_path(path), bytes))
    }

    pub fn is_image(&self) -> bool {
        self.media_type
            .trim()
            .to_ascii_lowercase()
            .starts_with("image/")
    }
}

/// An image held by the registry. Owns its preview lease, so the preview
/// reference lives exactly as long as the entry.
#[derive(Debug)]
pub struct ImageEntry {
    pub id: String,
    pub name: String,
    pub file: ImageFile,
    preview: PreviewLease,
}

impl ImageEntry {
    pub fn new(file: ImageFile, previews: &PreviewStore) -> Self {
        let preview = previews.acquire(file.bytes.clone());
        Self {
            id: Uuid::new_v4().to_string(),
            name: file.name.clone(),
            file,
            preview,
        }
    }

    pub fn preview_ref(&self) -> &str {
        self.preview.uri()
    }

    pub fn snapshot(&self) -> ImageSnapshot {
        ImageSnapshot {
            id: self.id.clone(),
            preview_ref: self.preview_ref().to_string(),
            name: self.name.clone(),
        }
    }

    pub fn batch_image(&self) -> BatchImage {
        BatchImage::new(
            self.id.clone(),
            self.name.clone(),
            self.file.media_type.clone(),
            self.file.bytes.clone(),
        )
    }
}

/// Copy of an entry's display data, kept by the user message that sent it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSnapshot {
    pub id: String,
    pub preview_ref: String,
    pub name: String,
}
