//! Record store errors.

use boxoffice_core::Revision;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during record store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Optimistic concurrency conflict: the collection was written by someone
    /// else after it was loaded.
    #[error("Concurrency conflict on {collection}: expected revision {expected}, found {actual}")]
    ConcurrencyConflict {
        /// The collection where the conflict occurred.
        collection: String,
        /// The revision the unit of work loaded.
        expected: Revision,
        /// The revision currently persisted.
        actual: Revision,
    },

    /// Another writer holds the store lock.
    #[error("Store is locked by another writer: {}", path.display())]
    Locked {
        /// The lock file that could not be acquired.
        path: PathBuf,
    },

    /// Filesystem error.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// The file being read or written.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A record could not be converted to or from JSON.
    #[error("Serialization error in {collection}: {source}")]
    Serialization {
        /// The collection being encoded.
        collection: String,
        /// The underlying error.
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Returns `true` if retrying the whole unit of work may succeed.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. } | Self::Locked { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_message_names_both_revisions() {
        let error = StoreError::ConcurrencyConflict {
            collection: "events".to_string(),
            expected: Revision::new(3),
            actual: Revision::new(4),
        };

        let message = error.to_string();
        assert!(message.contains("events"));
        assert!(message.contains("r3"));
        assert!(message.contains("r4"));
        assert!(error.is_conflict());
    }

    #[test]
    fn io_error_is_not_a_conflict() {
        let error = StoreError::Io {
            path: PathBuf::from("/tmp/events.json"),
            source: std::io::Error::other("disk full"),
        };
        assert!(!error.is_conflict());
        assert!(error.to_string().contains("events.json"));
    }
}
