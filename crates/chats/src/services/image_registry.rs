//! Ordered, bounded set of images selected for the next question.

use tracing::{debug, info};

use crate::entities::{ImageEntry, ImageFile};
use crate::services::preview_store::PreviewStore;
use crate::types::{ChatError, ChatResult};

pub const REJECTED_FILES_MESSAGE: &str = "Some files were rejected. Only images are allowed.";
pub const NON_IMAGE_MESSAGE: &str = "Only image files are allowed.";

/// What happened to one `add_files` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddOutcome {
    /// Ids of the entries appended, in order.
    pub added: Vec<String>,
    /// One message per refused candidate or rejection batch, in order.
    pub errors: Vec<String>,
}

impl AddOutcome {
    /// The message a banner should show; later errors replace earlier ones.
    pub fn banner(&self) -> Option<&str> {
        self.errors.last().map(String::as_str)
    }
}

#[derive(Debug)]
pub struct ImageRegistry {
    max_images: usize,
    previews: PreviewStore,
    entries: Vec<ImageEntry>,
}

impl ImageRegistry {
    pub fn new(max_images: usize, previews: PreviewStore) -> Self {
        Self {
            max_images,
            previews,
            entries: Vec::new(),
        }
    }

    pub fn max_images(&self) -> usize {
        self.max_images
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.max_images
    }

    pub fn entries(&self) -> &[ImageEntry] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&ImageEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn previews(&self) -> &PreviewStore {
        &self.previews
    }

    fn capacity_message(&self) -> String {
        ChatError::RegistryFull {
            max: self.max_images,
        }
        .to_string()
    }

    /// Accept files from the picker. `rejected` counts files the picker
    /// itself refused (unreadable or filtered out).
    pub fn add_files(&mut self, accepted: Vec<ImageFile>, rejected: usize) -> AddOutcome {
        let mut outcome = AddOutcome::default();

        if rejected > 0 {
            outcome.errors.push(REJECTED_FILES_MESSAGE.to_string());
        }

        for file in accepted {
            if !file.is_image() {
                debug!(name = %file.name, media_type = %file.media_type, "skipping non-image file");
                outcome.errors.push(NON_IMAGE_MESSAGE.to_string());
                continue;
            }

            if self.is_full() {
                debug!(name = %file.name, max = self.max_images, "image registry full");
                outcome.errors.push(self.capacity_message());
                break;
            }

            let entry = ImageEntry::new(file, &self.previews);
            info!(id = %entry.id, name = %entry.name, "image added");
            outcome.added.push(entry.id.clone());
            self.entries.push(entry);
        }

        outcome
    }

    /// Drop the entry with `id`, releasing its preview. Unknown ids are a
    /// no-op.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(position) = self.entries.iter().position(|entry| entry.id == id) else {
            return false;
        };

        let entry = self.entries.remove(position);
        info!(id = %entry.id, name = %entry.name, "image removed");
        true
    }

    /// Resolve a selector to an entry id. One or two characters (optionally
    /// prefixed with `#`) name a 1-based position; anything longer is an id
    /// prefix.
    pub fn resolve_id(&self, selector: &str) -> ChatResult<String> {
        let selector = selector.trim();
        let key = selector.strip_prefix('#').unwrap_or(selector);

        if key.chars().count() <= 2 {
            return key
                .parse::<usize>()
                .ok()
                .and_then(|position| self.entries.get(position.checked_sub(1)?))
                .map(|entry| entry.id.clone())
                .ok_or_else(|| ChatError::image_not_found(selector));
        }

        let mut matches = self.entries.iter().filter(|entry| entry.id.starts_with(key));
        match (matches.next(), matches.next()) {
            (Some(entry), None) => Ok(entry.id.clone()),
            (Some(_), Some(_)) => Err(ChatError::validation(format!(
                "Image selector '{selector}' is ambiguous"
            ))),
            _ => Err(ChatError::image_not_found(selector)),
        }
    }

    /// Replace the whole list. Superseded entries release their previews.
    pub fn set_images(&mut self, images: Vec<ImageEntry>) -> ChatResult<()> {
        if images.len() > self.max_images {
            return Err(ChatError::RegistryFull {
                max: self.max_images,
            });
        }

        let superseded = std::mem::replace(&mut self.entries, images);
        debug!(released = superseded.len(), "image list replaced");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(name: &str) -> ImageFile {
        ImageFile::new(name, "image/png", name.as_bytes().to_vec())
    }

    fn registry() -> ImageRegistry {
        ImageRegistry::new(4, PreviewStore::new())
    }

    #[test]
    fn appends_images_in_order_with_fresh_ids() {
        let mut registry = registry();
        let outcome = registry.add_files(vec![png("a.png"), png("b.png")], 0);

        assert_eq!(outcome.added.len(), 2);
        assert!(outcome.errors.is_empty());
        assert_ne!(outcome.added[0], outcome.added[1]);
        let names: Vec<&str> = registry.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "b.png"]);
        assert_eq!(registry.previews().live(), 2);
    }

    #[test]
    fn fifth_image_is_refused_with_one_error() {
        let mut registry = registry();
        registry.add_files(vec![png("1"), png("2"), png("3"), png("4")], 0);
        let before: Vec<String> = registry.entries().iter().map(|e| e.id.clone()).collect();

        let outcome = registry.add_files(vec![png("5")], 0);

        assert!(outcome.added.is_empty());
        assert_eq!(outcome.errors, vec!["You can upload up to 4 images.".to_string()]);
        let after: Vec<String> = registry.entries().iter().map(|e| e.id.clone()).collect();
        assert_eq!(before, after);
        assert_eq!(registry.previews().live(), 4);
    }

    #[test]
    fn capacity_stops_accepting_the_rest_of_the_drop() {
        let mut registry = registry();
        let outcome = registry.add_files(
            vec![png("1"), png("2"), png("3"), png("4"), png("5"), png("6")],
            0,
        );

        assert_eq!(outcome.added.len(), 4);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn non_image_is_skipped_without_using_a_slot() {
        let mut registry = registry();
        registry.add_files(vec![png("1"), png("2"), png("3")], 0);

        let outcome = registry.add_files(
            vec![ImageFile::new("notes.txt", "text/plain", b"hi".to_vec())],
            0,
        );

        assert_eq!(outcome.errors, vec![NON_IMAGE_MESSAGE.to_string()]);
        assert_eq!(registry.len(), 3);

        let outcome = registry.add_files(vec![png("4")], 0);
        assert_eq!(outcome.added.len(), 1);
        assert!(registry.is_full());
    }

    #[test]
    fn picker_rejections_raise_a_banner() {
        let mut registry = registry();
        let outcome = registry.add_files(vec![png("a.png")], 2);
        assert_eq!(outcome.added.len(), 1);
        assert_eq!(outcome.banner(), Some(REJECTED_FILES_MESSAGE));
    }

    #[test]
    fn remove_releases_the_preview() {
        let mut registry = registry();
        let outcome = registry.add_files(vec![png("a.png"), png("b.png")], 0);
        let uri = registry.entries()[0].preview_ref().to_string();

        assert!(registry.remove(&outcome.added[0]));
        assert!(registry.previews().resolve(&uri).is_none());
        assert_eq!(registry.previews().live(), 1);
        assert!(!registry.remove(&outcome.added[0]));
    }

    #[test]
    fn set_images_releases_superseded_entries() {
        let mut registry = registry();
        registry.add_files(vec![png("a.png"), png("b.png")], 0);
        let replacement = ImageEntry::new(png("c.png"), registry.previews());

        registry.set_images(vec![replacement]).expect("within capacity");

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.previews().live(), 1);
        assert_eq!(registry.previews().released(), 2);
    }

    #[test]
    fn set_images_rejects_oversized_lists() {
        let mut registry = ImageRegistry::new(1, PreviewStore::new());
        let store = registry.previews().clone();
        let list = vec![ImageEntry::new(png("a"), &store), ImageEntry::new(png("b"), &store)];

        assert!(matches!(
            registry.set_images(list),
            Err(ChatError::RegistryFull { max: 1 })
        ));
        assert!(registry.is_empty());
        assert_eq!(store.live(), 0);
    }

    #[test]
    fn resolve_id_accepts_positions_and_prefixes() {
        let mut registry = registry();
        let outcome = registry.add_files(vec![png("a.png"), png("b.png")], 0);

        assert_eq!(registry.resolve_id("2").unwrap(), outcome.added[1]);
        assert_eq!(registry.resolve_id("#1").unwrap(), outcome.added[0]);
        assert_eq!(registry.resolve_id(&outcome.added[1][..8]).unwrap(), outcome.added[1]);
        assert!(registry.resolve_id("9").is_err());
        assert!(registry.resolve_id("0").is_err());
    }

    #[test]
    fn short_selectors_are_positions_only() {
        let mut registry = registry();
        let store = registry.previews().clone();
        let mut first = ImageEntry::new(png("a.png"), &store);
        first.id = "ab12cd34".to_string();
        let mut second = ImageEntry::new(png("b.png"), &store);
        second.id = "7f00aa11".to_string();
        registry.set_images(vec![first, second]).expect("within capacity");

        assert!(matches!(
            registry.resolve_id("ab"),
            Err(ChatError::ImageNotFound { .. })
        ));
        assert!(registry.resolve_id("#7").is_err());
        assert_eq!(registry.resolve_id("ab1").unwrap(), "ab12cd34");
        assert_eq!(registry.resolve_id("#ab12").unwrap(), "ab12cd34");
        assert_eq!(registry.resolve_id("#2").unwrap(), "7f00aa11");
    }
}
