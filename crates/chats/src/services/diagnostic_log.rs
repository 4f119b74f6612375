//! Bounded rolling log shown next to the conversation, newest first.

use std::collections::VecDeque;

use tracing::info;

#[derive(Debug, Clone)]
pub struct DiagnosticLog {
    capacity: usize,
    entries: VecDeque<String>,
}

impl DiagnosticLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    pub fn record(&mut self, line: impl Into<String>) {
        let line = line.into();
        info!(target: "batchquery::log", "{line}");
        self.entries.push_front(line);
        self.entries.truncate(self.capacity);
    }

    /// Entries, most recent first.
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
