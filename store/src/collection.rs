//! Typed, change-tracking view over a collection snapshot.

use std::collections::BTreeMap;

use crate::{CollectionSnapshot, PendingWrite, Record, RecordStore, Revision, SequentialId, StoreError};

/// A loaded collection of `T` records.
///
/// The collection remembers exactly what it was loaded with. Only a real
/// difference (a changed record, a new record, or a consumed sequence number)
/// produces a [`PendingWrite`]; mutating a record to the value it already had
/// writes nothing.
///
/// Reads through [`iter`](Self::iter), [`get`](Self::get) and friends skip
/// soft-deleted records. Use [`iter_all`](Self::iter_all) to see everything.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection<T: Record> {
    revision: Revision,
    next_sequence: u64,
    counters: BTreeMap<String, u64>,
    records: Vec<T>,
    loaded: Vec<serde_json::Value>,
    loaded_sequence: u64,
    loaded_counters: BTreeMap<String, u64>,
}

impl<T: Record> Collection<T> {
    /// An empty, never-written collection.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            revision: Revision::INITIAL,
            next_sequence: 1,
            counters: BTreeMap::new(),
            records: Vec::new(),
            loaded: Vec::new(),
            loaded_sequence: 1,
            loaded_counters: BTreeMap::new(),
        }
    }

    /// Load `T::COLLECTION` from a store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn load<S: RecordStore + ?Sized>(store: &S) -> Result<Self, StoreError> {
        let snapshot = store.load(T::COLLECTION)?;
        Self::from_snapshot(snapshot)
    }

    /// Decode a snapshot.
    ///
    /// Records that no longer decode as `T` are skipped with a warning and
    /// will be dropped by the next commit of this collection.
    ///
    /// # Errors
    ///
    /// Returns an error if a decoded record cannot be encoded again.
    pub fn from_snapshot(snapshot: CollectionSnapshot) -> Result<Self, StoreError> {
        let mut records = Vec::with_capacity(snapshot.records.len());
        for (index, value) in snapshot.records.into_iter().enumerate() {
            match serde_json::from_value::<T>(value) {
                Ok(record) => records.push(record),
                Err(error) => {
                    tracing::warn!(
                        collection = T::COLLECTION,
                        index,
                        error = %error,
                        "Skipping undecodable record"
                    );
                }
            }
        }

        let loaded = encode_all::<T>(&records)?;
        let next_sequence = snapshot.next_sequence.max(1);

        tracing::debug!(
            collection = T::COLLECTION,
            revision = %snapshot.revision,
            records = records.len(),
            "Collection loaded"
        );

        Ok(Self {
            revision: snapshot.revision,
            next_sequence,
            counters: snapshot.counters.clone(),
            records,
            loaded,
            loaded_sequence: next_sequence,
            loaded_counters: snapshot.counters,
        })
    }

    /// Revision this collection was loaded at.
    #[must_use]
    pub const fn revision(&self) -> Revision {
        self.revision
    }

    /// Live (not soft-deleted) records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.records.iter().filter(|record| !record.is_deleted())
    }

    /// Mutable access to every live record.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.records.iter_mut().filter(|record| !record.is_deleted())
    }

    /// Every record, soft-deleted ones included.
    pub fn iter_all(&self) -> impl Iterator<Item = &T> {
        self.records.iter()
    }

    /// Look up a live record by id.
    #[must_use]
    pub fn get(&self, id: &T::Id) -> Option<&T> {
        self.iter().find(|record| record.id() == id)
    }

    /// Look up a live record by id for modification.
    pub fn get_mut(&mut self, id: &T::Id) -> Option<&mut T> {
        self.iter_mut().find(|record| record.id() == id)
    }

    /// Check if a live record with this id exists.
    #[must_use]
    pub fn exists(&self, id: &T::Id) -> bool {
        self.get(id).is_some()
    }

    /// Number of live records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Check if there are no live records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take the next sequence number. Numbers are never handed out twice, even
    /// if the record that used one is later deleted.
    pub fn allocate_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.saturating_add(1);
        sequence
    }

    /// Take the next sequence number as a typed id.
    pub fn allocate_id(&mut self) -> T::Id
    where
        T::Id: SequentialId,
    {
        T::Id::from_sequence(self.allocate_sequence())
    }

    /// Take the next number from a named nested sequence (starting at 1).
    ///
    /// Used for ids of values embedded inside records, which have no
    /// collection of their own.
    pub fn allocate_counter(&mut self, name: &str) -> u64 {
        let next = self.counters.entry(name.to_string()).or_insert(1);
        let sequence = (*next).max(1);
        *next = sequence.saturating_add(1);
        sequence
    }

    /// Append a record.
    pub fn insert(&mut self, record: T) {
        self.records.push(record);
    }

    /// Encode the current contents at the loaded revision.
    ///
    /// # Errors
    ///
    /// Returns an error if a record fails to serialize.
    pub fn to_snapshot(&self) -> Result<CollectionSnapshot, StoreError> {
        Ok(CollectionSnapshot {
            revision: self.revision,
            next_sequence: self.next_sequence,
            records: encode_all::<T>(&self.records)?,
            counters: self.counters.clone(),
        })
    }

    /// Check whether the contents differ from what was loaded.
    ///
    /// # Errors
    ///
    /// Returns an error if a record fails to serialize.
    pub fn is_changed(&self) -> Result<bool, StoreError> {
        Ok(self.pending_write()?.is_some())
    }

    /// The write needed to persist this collection, or `None` if nothing
    /// changed since it was loaded.
    ///
    /// # Errors
    ///
    /// Returns an error if a record fails to serialize.
    pub fn pending_write(&self) -> Result<Option<PendingWrite>, StoreError> {
        let records = encode_all::<T>(&self.records)?;
        if records == self.loaded
            && self.next_sequence == self.loaded_sequence
            && self.counters == self.loaded_counters
        {
            return Ok(None);
        }

        Ok(Some(PendingWrite {
            collection: T::COLLECTION,
            expected: self.revision,
            snapshot: CollectionSnapshot {
                revision: self.revision.next(),
                next_sequence: self.next_sequence,
                records,
                counters: self.counters.clone(),
            },
        }))
    }
}

impl<T: Record> Default for Collection<T> {
    fn default() -> Self {
        Self::empty()
    }
}

fn encode_all<T: Record>(records: &[T]) -> Result<Vec<serde_json::Value>, StoreError> {
    records
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| StoreError::Serialization {
            collection: T::COLLECTION.to_string(),
            source,
        })
}
