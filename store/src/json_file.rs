//! JSON-file backed record store.
//!
//! Layout of the data directory:
//!
//! ```text
//! data/
//!   events.json          { "revision": 3, "next_sequence": 4, "records": [...] }
//!   registrations.json
//!   ...
//!   .boxoffice.lock      holder's process id, present while a commit is in progress
//! ```
//!
//! Each file is replaced atomically (write to `*.tmp`, then rename). A batch
//! touching several files is checked as a whole before anything is written,
//! but a crash between two renames can still leave the batch half-applied.

use crate::{CollectionSnapshot, PendingWrite, RecordStore, StoreError};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime};
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

const LOCK_FILE: &str = ".boxoffice.lock";
/// How long a lock file without a process id is trusted
const UNRECORDED_LOCK_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_LOCK_ATTEMPTS: u32 = 50;
const DEFAULT_LOCK_BACKOFF: Duration = Duration::from_millis(10);

/// Record store keeping one JSON document per collection in a directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
    lock_attempts: u32,
    lock_backoff: Duration,
}

impl JsonFileStore {
    /// Open (creating if needed) a data directory.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;

        tracing::debug!(dir = %dir.display(), "Opened JSON record store");

        Ok(Self {
            dir,
            lock_attempts: DEFAULT_LOCK_ATTEMPTS,
            lock_backoff: DEFAULT_LOCK_BACKOFF,
        })
    }

    /// How long to keep retrying when another writer holds the lock.
    #[must_use]
    pub const fn with_lock_retry(mut self, attempts: u32, backoff: Duration) -> Self {
        self.lock_attempts = attempts;
        self.lock_backoff = backoff;
        self
    }

    /// The data directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding a collection.
    #[must_use]
    pub fn path_for(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{collection}.json"))
    }

    fn read_snapshot(&self, collection: &str) -> CollectionSnapshot {
        let path = self.path_for(collection);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return CollectionSnapshot::empty();
            }
            Err(error) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %error,
                    "Collection file unreadable, treating as empty"
                );
                return CollectionSnapshot::empty();
            }
        };

        match serde_json::from_slice::<CollectionSnapshot>(&bytes) {
            Ok(snapshot) => snapshot,
            Err(error) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %error,
                    "Collection file corrupt, treating as empty"
                );
                CollectionSnapshot::empty()
            }
        }
    }

    fn write_atomic(&self, collection: &str, snapshot: &CollectionSnapshot) -> Result<(), StoreError> {
        let path = self.path_for(collection);
        let tmp_path = self.dir.join(format!("{collection}.json.tmp"));

        let mut bytes =
            serde_json::to_vec_pretty(snapshot).map_err(|source| StoreError::Serialization {
                collection: collection.to_string(),
                source,
            })?;
        bytes.push(b'\n');

        fs::write(&tmp_path, &bytes).map_err(|source| StoreError::Io {
            path: tmp_path.clone(),
            source,
        })?;

        if let Err(source) = fs::rename(&tmp_path, &path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(StoreError::Io { path, source });
        }

        Ok(())
    }
}

impl RecordStore for JsonFileStore {
    fn load(&self, collection: &str) -> Result<CollectionSnapshot, StoreError> {
        Ok(self.read_snapshot(collection))
    }

    fn commit(&self, writes: Vec<PendingWrite>) -> Result<(), StoreError> {
        if writes.is_empty() {
            return Ok(());
        }

        let _lock = StoreLock::acquire(&self.dir, self.lock_attempts, self.lock_backoff)?;

        for write in &writes {
            let actual = self.read_snapshot(write.collection).revision;
            if actual != write.expected {
                tracing::warn!(
                    collection = write.collection,
                    expected = %write.expected,
                    actual = %actual,
                    "Rejected stale commit"
                );
                return Err(StoreError::ConcurrencyConflict {
                    collection: write.collection.to_string(),
                    expected: write.expected,
                    actual,
                });
            }
        }

        for write in &writes {
            self.write_atomic(write.collection, &write.snapshot)?;
            tracing::debug!(
                collection = write.collection,
                revision = %write.snapshot.revision,
                records = write.snapshot.records.len(),
                "Collection committed"
            );
        }

        Ok(())
    }
}

/// Exclusive lock on a data directory, released on drop.
///
/// The lock file records the holder's process id. A lock left behind by a
/// process that is no longer running is broken and taken over, as is an
/// old lock file whose holder never got to record its id.
#[derive(Debug)]
struct StoreLock {
    path: PathBuf,
}

impl StoreLock {
    fn acquire(dir: &Path, attempts: u32, backoff: Duration) -> Result<Self, StoreError> {
        let path = dir.join(LOCK_FILE);

        for attempt in 0..attempts.max(1) {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    if let Err(source) = writeln!(file, "{}", std::process::id()) {
                        let _ = fs::remove_file(&path);
                        return Err(StoreError::Io { path, source });
                    }
                    return Ok(Self { path });
                }
                Err(error) if error.kind() == ErrorKind::AlreadyExists => {
                    if Self::break_if_stale(&path) {
                        continue;
                    }
                    tracing::debug!(attempt, "Store lock busy, retrying");
                    thread::sleep(backoff);
                }
                Err(source) => return Err(StoreError::Io { path, source }),
            }
        }

        Err(StoreError::Locked { path })
    }

    /// Remove the lock at `path` if its holder is gone. Returns `true` when
    /// the caller should try to take the lock again straight away.
    fn break_if_stale(path: &Path) -> bool {
        let holder = match fs::read_to_string(path) {
            Ok(contents) => contents.trim().parse::<u32>().ok(),
            // Released between our attempt and this read
            Err(error) if error.kind() == ErrorKind::NotFound => return true,
            Err(_) => return false,
        };

        let stale = match holder {
            Some(pid) => !process_is_running(pid),
            None => lock_age(path).is_some_and(|age| age > UNRECORDED_LOCK_TIMEOUT),
        };
        if !stale {
            return false;
        }

        tracing::warn!(path = %path.display(), ?holder, "Breaking stale store lock");
        match fs::remove_file(path) {
            Ok(()) => true,
            Err(error) => error.kind() == ErrorKind::NotFound,
        }
    }
}

fn process_is_running(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        true,
        ProcessRefreshKind::nothing(),
    );
    system.process(pid).is_some()
}

fn lock_age(path: &Path) -> Option<Duration> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    SystemTime::now().duration_since(modified).ok()
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(error) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %error, "Failed to release store lock");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Revision;
    use serde_json::json;

    fn write_for(collection: &'static str, expected: u64, records: Vec<serde_json::Value>) -> PendingWrite {
        PendingWrite {
            collection,
            expected: Revision::new(expected),
            snapshot: CollectionSnapshot {
                revision: Revision::new(expected).next(),
                next_sequence: 2,
                records,
                ..CollectionSnapshot::empty()
            },
        }
    }

    #[test]
    fn missing_file_is_empty_collection() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();

        let snapshot = store.load("events").unwrap();
        assert_eq!(snapshot, CollectionSnapshot::empty());
    }

    #[test]
    fn commit_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();

        store
            .commit(vec![write_for("events", 0, vec![json!({ "id": "EV001" })])])
            .unwrap();

        let snapshot = store.load("events").unwrap();
        assert_eq!(snapshot.revision, Revision::new(1));
        assert_eq!(snapshot.next_sequence, 2);
        assert_eq!(snapshot.records, vec![json!({ "id": "EV001" })]);
        assert!(!dir.path().join("events.json.tmp").exists());
        assert!(!dir.path().join(LOCK_FILE).exists());
    }

    #[test]
    fn stale_revision_is_rejected_and_nothing_written() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        store.commit(vec![write_for("events", 0, vec![])]).unwrap();

        let result = store.commit(vec![
            write_for("payments", 0, vec![json!({ "id": "PAY001" })]),
            write_for("events", 0, vec![json!({ "id": "EV001" })]),
        ]);

        assert!(matches!(
            result,
            Err(StoreError::ConcurrencyConflict { ref collection, .. }) if collection == "events"
        ));
        assert!(store.load("payments").unwrap().records.is_empty());
        assert!(store.load("events").unwrap().records.is_empty());
    }

    #[test]
    fn corrupt_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("refunds.json"), b"{ not json").unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();

        assert_eq!(store.load("refunds").unwrap(), CollectionSnapshot::empty());

        // A corrupt file counts as revision 0 and can be overwritten
        store.commit(vec![write_for("refunds", 0, vec![])]).unwrap();
        assert_eq!(store.load("refunds").unwrap().revision, Revision::new(1));
    }

    #[test]
    fn held_lock_reports_locked() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path())
            .unwrap()
            .with_lock_retry(2, Duration::from_millis(1));
        let holder = format!("{}\n", std::process::id());
        fs::write(dir.path().join(LOCK_FILE), &holder).unwrap();

        let result = store.commit(vec![write_for("events", 0, vec![])]);

        assert!(matches!(result, Err(StoreError::Locked { .. })));
        // A live holder's lock is left alone
        assert_eq!(fs::read_to_string(dir.path().join(LOCK_FILE)).unwrap(), holder);
    }

    #[test]
    fn lock_of_a_dead_process_is_taken_over() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path())
            .unwrap()
            .with_lock_retry(2, Duration::from_millis(1));
        // Above any pid_max Linux allows
        fs::write(dir.path().join(LOCK_FILE), b"4294967000\n").unwrap();

        store
            .commit(vec![write_for("events", 0, vec![json!({ "id": "EV001" })])])
            .unwrap();

        assert_eq!(store.load("events").unwrap().records.len(), 1);
        assert!(!dir.path().join(LOCK_FILE).exists());
    }

    #[test]
    fn fresh_lock_without_a_pid_is_respected() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path())
            .unwrap()
            .with_lock_retry(2, Duration::from_millis(1));
        fs::write(dir.path().join(LOCK_FILE), b"").unwrap();

        let result = store.commit(vec![write_for("events", 0, vec![])]);
        assert!(matches!(result, Err(StoreError::Locked { .. })));
    }

    #[test]
    fn lock_records_the_holder_pid() {
        let dir = tempfile::tempdir().unwrap();
        let lock = StoreLock::acquire(dir.path(), 1, Duration::from_millis(1)).unwrap();

        let recorded = fs::read_to_string(dir.path().join(LOCK_FILE)).unwrap();
        assert_eq!(recorded.trim(), std::process::id().to_string());
        drop(lock);
        assert!(!dir.path().join(LOCK_FILE).exists());
    }

    #[test]
    fn empty_batch_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        fs::write(dir.path().join(LOCK_FILE), b"").unwrap();

        store.commit(Vec::new()).unwrap();
        assert!(!store.path_for("events").exists());
    }

    #[test]
    fn identical_commits_produce_identical_bytes() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let a = JsonFileStore::open(dir_a.path()).unwrap();
        let b = JsonFileStore::open(dir_b.path()).unwrap();
        let records = vec![json!({ "id": "EV001", "name": "Gala", "seats": 100 })];

        a.commit(vec![write_for("events", 0, records.clone())]).unwrap();
        b.commit(vec![write_for("events", 0, records)]).unwrap();

        assert_eq!(
            fs::read(a.path_for("events")).unwrap(),
            fs::read(b.path_for("events")).unwrap()
        );
    }
}
