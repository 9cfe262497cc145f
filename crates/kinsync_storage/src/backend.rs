//! Storage backend trait definition.

use crate::error::StorageResult;

/// Key of a stored record: the raw bytes of its entity id.
pub type RecordKey = [u8; 16];

/// A transactional storage backend for KinSync.
///
/// Storage backends are **opaque value stores**. Values are grouped into
/// named collections and addressed by a 16-byte key. The entity store owns
/// all encoding; backends never look inside a value except through a
/// caller-supplied query predicate.
///
/// # Invariants
///
/// - `insert`/`delete` are staged and only become durable on `commit`
/// - `get`/`query` observe staged writes
/// - `rollback` restores the last committed state exactly
/// - A failed `commit` keeps the staged writes so the caller can roll back
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::FileBackend`] - For persistent storage
pub trait StorageBackend: Send + Sync {
    /// Inserts or replaces the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unable to stage the write.
    fn insert(&mut self, collection: &str, key: RecordKey, value: Vec<u8>) -> StorageResult<()>;

    /// Reads the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, collection: &str, key: &RecordKey) -> StorageResult<Option<Vec<u8>>>;

    /// Returns every record of `collection` accepted by `predicate`,
    /// ordered by key.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn query(
        &self,
        collection: &str,
        predicate: &dyn Fn(&RecordKey, &[u8]) -> bool,
    ) -> StorageResult<Vec<(RecordKey, Vec<u8>)>>;

    /// Deletes the value stored under `key`.
    ///
    /// Returns `true` if a value was present.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unable to stage the delete.
    fn delete(&mut self, collection: &str, key: &RecordKey) -> StorageResult<bool>;

    /// Makes every staged write durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the writes could not be persisted. Staged writes
    /// are left in place in that case.
    fn commit(&mut self) -> StorageResult<()>;

    /// Discards every staged write.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unable to discard its staging area.
    fn rollback(&mut self) -> StorageResult<()>;

    /// Returns true if there are staged writes not yet committed.
    fn has_pending(&self) -> bool;
}
