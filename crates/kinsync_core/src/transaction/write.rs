//! The write transaction handle.

use super::journal::UndoJournal;
use crate::config::StoreConfig;
use crate::entity::EntityId;
use crate::error::{CoreError, CoreResult};
use crate::model::{Family, Membership, MembershipView, Record, UserProfile};
use crate::stats::StoreStats;
use crate::store::StoreInner;
use crate::types::EntityKind;
use parking_lot::RwLockWriteGuard;
use tracing::{debug, warn};

/// An exclusive, atomic unit of work against an
/// [`EntityStore`](crate::EntityStore).
///
/// Holds the store's write guard for its whole lifetime. Writes are staged
/// in the storage backend and applied to the in-memory state immediately,
/// so later operations in the same transaction see them. `commit` makes
/// them durable; `rollback`, or dropping the handle, undoes them.
///
/// If staging a write fails part way through an operation, the transaction
/// is poisoned and `commit` refuses to proceed.
pub struct WriteTransaction<'a> {
    pub(super) inner: RwLockWriteGuard<'a, StoreInner>,
    pub(super) config: &'a StoreConfig,
    pub(super) stats: &'a StoreStats,
    journal: UndoJournal,
    poisoned: bool,
    finished: bool,
}

impl<'a> WriteTransaction<'a> {
    pub(crate) fn new(
        inner: RwLockWriteGuard<'a, StoreInner>,
        config: &'a StoreConfig,
        stats: &'a StoreStats,
    ) -> Self {
        Self {
            inner,
            config,
            stats,
            journal: UndoJournal::new(),
            poisoned: false,
            finished: false,
        }
    }

    // === Reads (observe this transaction's writes) ===

    /// Returns the family with `id`.
    #[must_use]
    pub fn family(&self, id: EntityId) -> Option<&Family> {
        self.inner.state.family(id)
    }

    /// Returns the user profile with `id`.
    #[must_use]
    pub fn user_profile(&self, id: EntityId) -> Option<&UserProfile> {
        self.inner.state.user_profile(id)
    }

    /// Returns the membership with `id`.
    #[must_use]
    pub fn membership(&self, id: EntityId) -> Option<&Membership> {
        self.inner.state.membership(id)
    }

    /// Returns a clone of any record.
    #[must_use]
    pub fn record(&self, kind: EntityKind, id: EntityId) -> Option<Record> {
        self.inner.state.get(kind, id)
    }

    /// Every record of `kind`, in id order.
    #[must_use]
    pub fn records(&self, kind: EntityKind) -> Vec<Record> {
        self.inner.state.records(kind)
    }

    /// Number of records of `kind`.
    #[must_use]
    pub fn count(&self, kind: EntityKind) -> usize {
        self.inner.state.count(kind)
    }

    /// Memberships of a family, oldest first, resolved against this
    /// transaction's state.
    #[must_use]
    pub fn family_memberships(&self, family_id: EntityId) -> Vec<MembershipView> {
        let state = &self.inner.state;
        state
            .family_memberships(family_id)
            .into_iter()
            .map(|m| state.view(m))
            .collect()
    }

    /// Number of writes staged so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.journal.len()
    }

    // === Staging primitives ===

    /// Stages an insert or replacement of `record`.
    pub(super) fn stage_put(&mut self, record: Record) -> CoreResult<()> {
        let kind = record.kind();
        let id = record.id();
        let bytes = record.encode()?;
        let inner = &mut *self.inner;
        if let Err(e) = inner
            .backend
            .insert(kind.collection_name(), *id.as_bytes(), bytes)
        {
            self.poisoned = true;
            return Err(e.into());
        }
        let previous = inner.state.put(record);
        self.journal.record(kind, id, previous);
        Ok(())
    }

    /// Stages the deletion of a record, returning it if it existed.
    pub(super) fn stage_delete(&mut self, kind: EntityKind, id: EntityId) -> CoreResult<Option<Record>> {
        let inner = &mut *self.inner;
        if !inner.state.contains(kind, id) {
            return Ok(None);
        }
        if let Err(e) = inner.backend.delete(kind.collection_name(), id.as_bytes()) {
            self.poisoned = true;
            return Err(e.into());
        }
        let previous = inner.state.remove(kind, id);
        self.journal.record(kind, id, previous.clone());
        Ok(previous)
    }

    /// Counts a rejected write and hands the error back.
    pub(super) fn reject(&self, err: CoreError) -> CoreError {
        match &err {
            CoreError::ConstraintViolation { .. } => self.stats.record_constraint_violation(),
            CoreError::InvalidData { .. } => self.stats.record_validation_failure(),
            _ => {}
        }
        err
    }

    // === Completion ===

    /// Makes every staged write durable.
    ///
    /// # Errors
    ///
    /// Returns an error, after rolling everything back, if the transaction
    /// is poisoned or the storage backend refuses the commit.
    pub fn commit(mut self) -> CoreResult<()> {
        if self.poisoned {
            self.abort();
            return Err(CoreError::transaction_aborted(
                "a write failed to stage earlier in the transaction",
            ));
        }

        if let Err(e) = self.inner.backend.commit() {
            warn!(error = %e, writes = self.journal.len(), "commit rejected by storage backend");
            self.abort();
            return Err(e.into());
        }

        debug!(writes = self.journal.len(), "transaction committed");
        self.journal.clear();
        self.finished = true;
        self.stats.record_transaction_commit();
        Ok(())
    }

    /// Discards every staged write.
    pub fn rollback(mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        if self.journal.is_empty() && !self.inner.backend.has_pending() {
            return;
        }

        let inner = &mut *self.inner;
        if let Err(e) = inner.backend.rollback() {
            warn!(error = %e, "storage backend rollback failed");
        }
        debug!(writes = self.journal.len(), "transaction rolled back");
        self.journal.undo(&mut inner.state);
        self.stats.record_transaction_abort();
    }
}

impl Drop for WriteTransaction<'_> {
    fn drop(&mut self) {
        self.abort();
    }
}

impl std::fmt::Debug for WriteTransaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteTransaction")
            .field("writes", &self.journal.len())
            .field("poisoned", &self.poisoned)
            .field("finished", &self.finished)
            .finish()
    }
}
