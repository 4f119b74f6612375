//! Locally resolvable preview references for selected images.
//!
//! Every reference handed out is owned by a [`PreviewLease`]; dropping the
//! lease releases the stored content, so an entry that leaves the registry
//! can never keep its preview alive.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

use bytes::Bytes;
use tracing::debug;
use uuid::Uuid;

pub const PREVIEW_SCHEME: &str = "preview://";

#[derive(Default)]
struct PreviewTable {
    entries: HashMap<String, Bytes>,
    issued: u64,
    released: u64,
}

#[derive(Clone, Default)]
pub struct PreviewStore {
    inner: Arc<Mutex<PreviewTable>>,
}

impl fmt::Debug for PreviewStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.table();
        f.debug_struct("PreviewStore")
            .field("live", &table.entries.len())
            .field("issued", &table.issued)
            .field("released", &table.released)
            .finish()
    }
}

impl PreviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, PreviewTable> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers `content` and returns the lease owning its reference.
    pub fn acquire(&self, content: Bytes) -> PreviewLease {
        let uri = format!("{PREVIEW_SCHEME}{}", Uuid::new_v4());
        {
            let mut table = self.table();
            table.entries.insert(uri.clone(), content);
            table.issued += 1;
        }
        debug!(%uri, "preview reference issued");

        PreviewLease {
            uri,
            store: self.clone(),
        }
    }

    pub fn resolve(&self, uri: &str) -> Option<Bytes> {
        self.table().entries.get(uri).cloned()
    }

    /// Number of references currently alive.
    pub fn live(&self) -> usize {
        self.table().entries.len()
    }

    pub fn released(&self) -> u64 {
        self.table().released
    }

    fn release(&self, uri: &str) {
        let mut table = self.table();
        if table.entries.remove(uri).is_some() {
            table.released += 1;
            debug!(%uri, "preview reference released");
        }
    }
}

/// Owner of one preview reference. Not `Clone`: exactly one release per
/// acquisition.
pub struct PreviewLease {
    uri: String,
    store: PreviewStore,
}

impl PreviewLease {
    pub fn uri(&self) -> &str {
        &self.uri
    }
}

impl fmt::Debug for PreviewLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PreviewLease").field(&self.uri).finish()
    }
}

impl Drop for PreviewLease {
    fn drop(&mut self) {
        self.store.release(&self.uri);
    }
}
