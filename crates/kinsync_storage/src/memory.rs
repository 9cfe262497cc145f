//! In-memory storage backend for testing.

use crate::backend::{RecordKey, StorageBackend};
use crate::error::{StorageError, StorageResult};
use crate::tables::Tables;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// An in-memory storage backend.
///
/// This backend stores all data in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral stores that don't need persistence
///
/// Commits can be made to fail on demand through a [`CommitSwitch`], which
/// is how rollback paths are exercised in tests.
///
/// # Example
///
/// ```rust
/// use kinsync_storage::{StorageBackend, InMemoryBackend};
///
/// let mut backend = InMemoryBackend::new();
/// backend.insert("user", [7u8; 16], vec![1, 2, 3]).unwrap();
/// backend.rollback().unwrap();
/// assert_eq!(backend.get("user", &[7u8; 16]).unwrap(), None);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    tables: Tables,
    reject_commits: Arc<AtomicBool>,
}

/// Shared handle that makes an [`InMemoryBackend`] reject commits.
#[derive(Debug, Clone)]
pub struct CommitSwitch(Arc<AtomicBool>);

impl CommitSwitch {
    /// Makes every following commit fail (or succeed again).
    pub fn reject_commits(&self, reject: bool) {
        self.0.store(reject, Ordering::SeqCst);
    }
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle that can make this backend's commits fail.
    #[must_use]
    pub fn commit_switch(&self) -> CommitSwitch {
        CommitSwitch(Arc::clone(&self.reject_commits))
    }

    /// Returns the number of committed records across all collections.
    #[must_use]
    pub fn committed_len(&self) -> usize {
        self.tables.committed_len()
    }
}

impl StorageBackend for InMemoryBackend {
    fn insert(&mut self, collection: &str, key: RecordKey, value: Vec<u8>) -> StorageResult<()> {
        self.tables.insert(collection, key, value);
        Ok(())
    }

    fn get(&self, collection: &str, key: &RecordKey) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.tables.get(collection, key))
    }

    fn query(
        &self,
        collection: &str,
        predicate: &dyn Fn(&RecordKey, &[u8]) -> bool,
    ) -> StorageResult<Vec<(RecordKey, Vec<u8>)>> {
        Ok(self.tables.query(collection, predicate))
    }

    fn delete(&mut self, collection: &str, key: &RecordKey) -> StorageResult<bool> {
        Ok(self.tables.delete(collection, key))
    }

    fn commit(&mut self) -> StorageResult<()> {
        if self.reject_commits.load(Ordering::SeqCst) {
            return Err(StorageError::CommitRejected(
                "in-memory backend is rejecting commits".into(),
            ));
        }
        self.tables.apply_staged();
        Ok(())
    }

    fn rollback(&mut self) -> StorageResult<()> {
        self.tables.discard_staged();
        Ok(())
    }

    fn has_pending(&self) -> bool {
        self.tables.has_pending()
    }
}
