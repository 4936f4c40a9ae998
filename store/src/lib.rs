//! # Box Office Store
//!
//! Revisioned record collections for the Box Office engine.
//!
//! Every entity kind lives in its own named collection. A collection is loaded
//! whole, changed in memory, and committed back whole. Commits are guarded by
//! a per-collection [`Revision`]: a writer that loaded revision `n` may only
//! replace a collection that is still at revision `n`.
//!
//! - [`RecordStore`]: the persistence seam (load snapshots, commit writes)
//! - [`JsonFileStore`]: one JSON document per collection on disk
//! - [`Collection`]: typed view over a snapshot, with id sequences and
//!   change detection
//!
//! # Example
//!
//! ```no_run
//! use boxoffice_store::{Collection, JsonFileStore, RecordStore};
//! # use boxoffice_store::Record;
//! # use serde::{Deserialize, Serialize};
//! # #[derive(Clone, Debug, Serialize, Deserialize)]
//! # struct Note { id: String, text: String }
//! # impl Record for Note {
//! #     type Id = String;
//! #     const COLLECTION: &'static str = "notes";
//! #     fn id(&self) -> &String { &self.id }
//! # }
//!
//! # fn main() -> Result<(), boxoffice_store::StoreError> {
//! let store = JsonFileStore::open("./data")?;
//! let mut notes: Collection<Note> = Collection::load(&store)?;
//! let sequence = notes.allocate_sequence();
//! notes.insert(Note { id: format!("N{sequence:03}"), text: "hello".into() });
//!
//! if let Some(write) = notes.pending_write()? {
//!     store.commit(vec![write])?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod collection;
pub mod error;
pub mod json_file;

pub use boxoffice_core::Revision;
pub use collection::Collection;
pub use error::StoreError;
pub use json_file::JsonFileStore;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The persisted form of one collection.
///
/// Serialized as `{ "revision": .., "next_sequence": .., "records": [..] }`,
/// plus a `counters` map when nested sequences are in use.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CollectionSnapshot {
    /// Number of commits this collection has seen.
    pub revision: Revision,
    /// Next id sequence number to hand out (sequences start at 1).
    #[serde(default = "first_sequence")]
    pub next_sequence: u64,
    /// Records in insertion order, soft-deleted ones included.
    #[serde(default)]
    pub records: Vec<serde_json::Value>,
    /// Extra named sequences for ids of records nested inside this
    /// collection's records. Each counter holds the next number to hand out.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub counters: BTreeMap<String, u64>,
}

const fn first_sequence() -> u64 {
    1
}

impl CollectionSnapshot {
    /// A collection that has never been written.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            revision: Revision::INITIAL,
            next_sequence: 1,
            records: Vec::new(),
            counters: BTreeMap::new(),
        }
    }
}

impl Default for CollectionSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

/// A replacement for one collection, valid only against `expected`.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingWrite {
    /// Collection name.
    pub collection: &'static str,
    /// Revision the writer loaded; the commit fails if the store moved on.
    pub expected: Revision,
    /// New contents, already stamped with `expected.next()`.
    pub snapshot: CollectionSnapshot,
}

/// Persistence seam for record collections.
///
/// Implementations must apply a batch of writes all-or-nothing with respect to
/// revision checks: if any collection in the batch has moved past its expected
/// revision, nothing is written.
pub trait RecordStore: Send + Sync {
    /// Load the current snapshot of a collection.
    ///
    /// A collection that does not exist yet is returned as
    /// [`CollectionSnapshot::empty`].
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be reached at all.
    fn load(&self, collection: &str) -> Result<CollectionSnapshot, StoreError>;

    /// Commit a batch of collection replacements.
    ///
    /// # Errors
    ///
    /// - [`StoreError::ConcurrencyConflict`] if any expected revision is stale
    /// - [`StoreError::Locked`] if another writer holds the store
    /// - [`StoreError::Io`] if a write fails
    fn commit(&self, writes: Vec<PendingWrite>) -> Result<(), StoreError>;
}

/// A record type stored in its own collection.
pub trait Record: Clone + Serialize + DeserializeOwned {
    /// Identifier type, compared by value.
    type Id: PartialEq + Clone + fmt::Display;

    /// Collection (and file) name.
    const COLLECTION: &'static str;

    /// This record's identifier.
    fn id(&self) -> &Self::Id;

    /// Soft-deleted records stay persisted but are hidden from reads.
    fn is_deleted(&self) -> bool {
        false
    }
}

/// Identifiers minted from a collection's sequence counter.
pub trait SequentialId: Sized {
    /// Build the identifier for sequence number `sequence`.
    fn from_sequence(sequence: u64) -> Self;
}
