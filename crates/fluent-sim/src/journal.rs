//! Append-only, thread-safe journals.
//!
//! Used for the global request log, the per-route request logs, the log of
//! unexpected (unmatched) requests and the dispatch error list. Writers can
//! only append; readers only ever receive a snapshot.

use parking_lot::RwLock;

/// Append-only log shared between dispatching tasks.
#[derive(Debug)]
pub struct Journal<T> {
    entries: RwLock<Vec<T>>,
}

impl<T> Journal<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Append an entry at the end of the journal.
    pub fn append(&self, entry: T) {
        self.entries.write().push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Remove every entry and hand them back in the order they were appended.
    pub fn drain(&self) -> Vec<T> {
        std::mem::take(&mut *self.entries.write())
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl<T: Clone> Journal<T> {
    /// Copy of the journal as it is right now.
    pub fn snapshot(&self) -> Vec<T> {
        self.entries.read().clone()
    }
}

impl<T> Default for Journal<T> {
    fn default() -> Self {
        Self::new()
    }
}
