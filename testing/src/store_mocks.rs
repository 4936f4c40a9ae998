//! In-memory record store for tests
//!
//! Provides fast, deterministic storage with the same revision semantics as
//! the JSON file store:
//! - [`InMemoryRecordStore`]: HashMap-backed collections
//! - commit counting, so tests can prove a pass wrote nothing

#![allow(clippy::missing_panics_doc)] // Lock poisoning is recovered, never panics

use boxoffice_store::{CollectionSnapshot, PendingWrite, RecordStore, StoreError};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// In-memory record store for fast, deterministic testing.
///
/// Clones share the same underlying collections, which makes it easy to hand
/// one copy to a service and keep another for assertions.
///
/// # Example
///
/// ```
/// use boxoffice_store::{CollectionSnapshot, PendingWrite, RecordStore, Revision};
/// use boxoffice_testing::InMemoryRecordStore;
///
/// let store = InMemoryRecordStore::new();
/// store
///     .commit(vec![PendingWrite {
///         collection: "events",
///         expected: Revision::INITIAL,
///         snapshot: CollectionSnapshot { revision: Revision::new(1), ..CollectionSnapshot::empty() },
///     }])
///     .unwrap();
///
/// assert_eq!(store.load("events").unwrap().revision, Revision::new(1));
/// assert_eq!(store.commit_count(), 1);
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryRecordStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    collections: HashMap<String, CollectionSnapshot>,
    commits: usize,
}

impl InMemoryRecordStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a collection directly, bypassing revision checks
    pub fn seed(&self, collection: &str, snapshot: CollectionSnapshot) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .collections
            .insert(collection.to_string(), snapshot);
    }

    /// Number of non-empty batches committed so far
    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).commits
    }

    /// Clear all collections (for test isolation)
    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.collections.clear();
        inner.commits = 0;
    }
}

impl RecordStore for InMemoryRecordStore {
    fn load(&self, collection: &str) -> Result<CollectionSnapshot, StoreError> {
        Ok(self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }

    fn commit(&self, writes: Vec<PendingWrite>) -> Result<(), StoreError> {
        if writes.is_empty() {
            return Ok(());
        }

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        for write in &writes {
            let actual = inner
                .collections
                .get(write.collection)
                .map(|snapshot| snapshot.revision)
                .unwrap_or_default();
            if actual != write.expected {
                return Err(StoreError::ConcurrencyConflict {
                    collection: write.collection.to_string(),
                    expected: write.expected,
                    actual,
                });
            }
        }

        for write in writes {
            inner
                .collections
                .insert(write.collection.to_string(), write.snapshot);
        }
        inner.commits += 1;

        Ok(())
    }
}
