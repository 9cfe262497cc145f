//! The entity store.
//!
//! `EntityStore` is the public face of the core crate. It owns the storage
//! backend, the decoded records, the unique-key indexes and the
//! relationship table, and serialises every mutation through a single
//! [`WriteTransaction`].

mod relationships;
mod state;
mod update;

pub(crate) use state::StoreState;
pub use update::{FamilyUpdate, UserProfileUpdate};

use crate::config::StoreConfig;
use crate::entity::EntityId;
use crate::error::{CoreError, CoreResult};
use crate::model::{
    Family, Membership, MembershipRole, MembershipView, Record, RemoteId, SyncMetadata,
    UserProfile,
};
use crate::stats::{StatsSnapshot, StoreStats};
use crate::sync_state::{DeletionReport, RecoveryReport};
use crate::transaction::WriteTransaction;
use crate::types::{EntityKind, Timestamp};
use crate::validation::require_lookup_key;
use kinsync_storage::{InMemoryBackend, RecordKey, StorageBackend};
use parking_lot::RwLock;
use tracing::info;

/// State guarded by the store lock.
pub(crate) struct StoreInner {
    pub(crate) state: StoreState,
    pub(crate) backend: Box<dyn StorageBackend>,
}

/// Local object store for families, user profiles and memberships.
///
/// Reads take a shared lock; writes go through one exclusive
/// [`WriteTransaction`] at a time. Every single-record operation below is
/// its own transaction; use [`write_transaction`](Self::write_transaction)
/// to group several.
///
/// # Example
///
/// ```rust
/// use kinsync_core::{EntityStore, Family, Membership, MembershipRole, UserProfile};
///
/// let store = EntityStore::in_memory();
/// let user = store.create_user_profile(UserProfile::new("Sam", "hash-sam")).unwrap();
/// let family = store.create_family(Family::new("Test Family", "TEST123", user.id)).unwrap();
/// store
///     .create_membership(Membership::new(family.id, user.id, MembershipRole::ParentAdmin))
///     .unwrap();
///
/// assert!(store.has_parent_admin(family.id));
/// assert_eq!(store.fetch_family_by_code("TEST123").unwrap().unwrap().id, family.id);
/// ```
pub struct EntityStore {
    inner: RwLock<StoreInner>,
    config: StoreConfig,
    stats: StoreStats,
}

impl EntityStore {
    /// Creates an empty store over an in-memory backend.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Creates an empty in-memory store with the given configuration.
    #[must_use]
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                state: StoreState::new(),
                backend: Box::new(InMemoryBackend::new()),
            }),
            config,
            stats: StoreStats::new(),
        }
    }

    /// Opens a store over `backend`, loading every record it holds.
    ///
    /// # Errors
    ///
    /// Returns an error if a record cannot be read or decoded, or if two
    /// stored records share a unique key.
    pub fn open(backend: Box<dyn StorageBackend>, config: StoreConfig) -> CoreResult<Self> {
        let mut state = StoreState::new();

        for kind in EntityKind::ALL {
            let rows = backend.query(kind.collection_name(), &|_: &RecordKey, _: &[u8]| true)?;
            for (key, bytes) in rows {
                let record = Record::decode(kind, EntityId::from_bytes(key), &bytes)?;
                state.check_unique(&record).map_err(|e| {
                    CoreError::codec(format!("stored records violate a unique key: {e}"))
                })?;
                state.put(record);
            }
        }

        info!(
            families = state.count(EntityKind::Family),
            user_profiles = state.count(EntityKind::UserProfile),
            memberships = state.count(EntityKind::Membership),
            "entity store opened"
        );

        Ok(Self {
            inner: RwLock::new(StoreInner { state, backend }),
            config,
            stats: StoreStats::new(),
        })
    }

    /// Returns the store configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns a snapshot of the store counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    // === Transactions ===

    /// Begins an exclusive write transaction.
    ///
    /// Blocks until any other writer has finished.
    pub fn begin_write(&self) -> WriteTransaction<'_> {
        WriteTransaction::new(self.inner.write(), &self.config, &self.stats)
    }

    /// Runs `f` in a write transaction, committing on `Ok` and rolling back
    /// on `Err`.
    ///
    /// # Errors
    ///
    /// Returns the error from `f`, or the commit error.
    pub fn write_transaction<F, T>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&mut WriteTransaction<'_>) -> CoreResult<T>,
    {
        let mut txn = self.begin_write();
        match f(&mut txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(e) => {
                txn.rollback();
                Err(e)
            }
        }
    }

    // === Create ===

    /// Inserts a family. See [`WriteTransaction::create_family`].
    ///
    /// # Errors
    ///
    /// `InvalidData` or `ConstraintViolation`.
    pub fn create_family(&self, family: Family) -> CoreResult<Family> {
        self.write_transaction(|txn| txn.create_family(family))
    }

    /// Inserts several families, each in its own transaction.
    ///
    /// Returns one result per input, in order. A failing entry does not
    /// affect the others.
    ///
    /// # Errors
    ///
    /// `InvalidData` if the batch exceeds the configured maximum size.
    pub fn create_families(&self, families: Vec<Family>) -> CoreResult<Vec<CoreResult<Family>>> {
        if families.len() > self.config.max_batch_size {
            return Err(CoreError::invalid_data(format!(
                "batch of {} exceeds the maximum of {}",
                families.len(),
                self.config.max_batch_size
            )));
        }
        Ok(families
            .into_iter()
            .map(|family| self.create_family(family))
            .collect())
    }

    /// Inserts a user profile. See [`WriteTransaction::create_user_profile`].
    ///
    /// # Errors
    ///
    /// `InvalidData` or `ConstraintViolation`.
    pub fn create_user_profile(&self, user: UserProfile) -> CoreResult<UserProfile> {
        self.write_transaction(|txn| txn.create_user_profile(user))
    }

    /// Inserts a membership. See [`WriteTransaction::create_membership`].
    ///
    /// # Errors
    ///
    /// `InvalidData` if a present reference does not resolve.
    pub fn create_membership(&self, membership: Membership) -> CoreResult<Membership> {
        self.write_transaction(|txn| txn.create_membership(membership))
    }

    // === Fetch ===

    /// Returns the family with `id`.
    #[must_use]
    pub fn fetch_family(&self, id: EntityId) -> Option<Family> {
        self.stats.record_lookup();
        self.inner.read().state.family(id).cloned()
    }

    /// Returns the user profile with `id`.
    #[must_use]
    pub fn fetch_user_profile(&self, id: EntityId) -> Option<UserProfile> {
        self.stats.record_lookup();
        self.inner.read().state.user_profile(id).cloned()
    }

    /// Returns the membership with `id`.
    #[must_use]
    pub fn fetch_membership(&self, id: EntityId) -> Option<Membership> {
        self.stats.record_lookup();
        self.inner.read().state.membership(id).cloned()
    }

    /// Returns any record by kind and id.
    #[must_use]
    pub fn fetch_record(&self, kind: EntityKind, id: EntityId) -> Option<Record> {
        self.stats.record_lookup();
        self.inner.read().state.get(kind, id)
    }

    /// Looks a family up by its join code.
    ///
    /// # Errors
    ///
    /// `InvalidData` if `code` is empty. A code nobody uses is `Ok(None)`.
    pub fn fetch_family_by_code(&self, code: &str) -> CoreResult<Option<Family>> {
        require_lookup_key("family code", code)?;
        self.stats.record_lookup();
        Ok(self.inner.read().state.family_by_code(code).cloned())
    }

    /// Looks a user profile up by its credential hash.
    ///
    /// # Errors
    ///
    /// `InvalidData` if `hash` is empty. An unknown hash is `Ok(None)`.
    pub fn fetch_user_profile_by_apple_user_id_hash(
        &self,
        hash: &str,
    ) -> CoreResult<Option<UserProfile>> {
        require_lookup_key("apple user id hash", hash)?;
        self.stats.record_lookup();
        Ok(self.inner.read().state.user_profile_by_hash(hash).cloned())
    }

    /// Every family, in id order.
    #[must_use]
    pub fn fetch_all_families(&self) -> Vec<Family> {
        self.inner.read().state.families().cloned().collect()
    }

    /// Every user profile, in id order.
    #[must_use]
    pub fn fetch_all_user_profiles(&self) -> Vec<UserProfile> {
        self.inner.read().state.user_profiles().cloned().collect()
    }

    /// Every membership, in id order.
    #[must_use]
    pub fn fetch_all_memberships(&self) -> Vec<Membership> {
        self.inner.read().state.memberships().cloned().collect()
    }

    /// Number of records of `kind`.
    #[must_use]
    pub fn count(&self, kind: EntityKind) -> usize {
        self.inner.read().state.count(kind)
    }

    // === Update ===

    /// Updates a family. See [`WriteTransaction::update_family`].
    ///
    /// # Errors
    ///
    /// `EntityNotFound`, `InvalidData` or `ConstraintViolation`.
    pub fn update_family(&self, id: EntityId, update: FamilyUpdate) -> CoreResult<Family> {
        self.write_transaction(|txn| txn.update_family(id, update))
    }

    /// Updates a user profile. See [`WriteTransaction::update_user_profile`].
    ///
    /// # Errors
    ///
    /// `EntityNotFound`, `InvalidData` or `ConstraintViolation`.
    pub fn update_user_profile(
        &self,
        id: EntityId,
        update: UserProfileUpdate,
    ) -> CoreResult<UserProfile> {
        self.write_transaction(|txn| txn.update_user_profile(id, update))
    }

    /// Changes a membership's role.
    ///
    /// # Errors
    ///
    /// `EntityNotFound`.
    pub fn set_membership_role(&self, id: EntityId, role: MembershipRole) -> CoreResult<Membership> {
        self.write_transaction(|txn| txn.set_membership_role(id, role))
    }

    /// Soft-removes a membership.
    ///
    /// # Errors
    ///
    /// `EntityNotFound`.
    pub fn remove_membership(&self, id: EntityId) -> CoreResult<Membership> {
        self.write_transaction(|txn| txn.remove_membership(id))
    }

    /// Reactivates a soft-removed membership.
    ///
    /// # Errors
    ///
    /// `EntityNotFound`.
    pub fn restore_membership(&self, id: EntityId) -> CoreResult<Membership> {
        self.write_transaction(|txn| txn.restore_membership(id))
    }

    /// Moves a membership to another user.
    ///
    /// # Errors
    ///
    /// `EntityNotFound` or `InvalidData`.
    pub fn reassign_membership_user(
        &self,
        id: EntityId,
        user_id: Option<EntityId>,
    ) -> CoreResult<Membership> {
        self.write_transaction(|txn| txn.reassign_membership_user(id, user_id))
    }

    /// Moves a membership to another family.
    ///
    /// # Errors
    ///
    /// `EntityNotFound` or `InvalidData`.
    pub fn reassign_membership_family(
        &self,
        id: EntityId,
        family_id: Option<EntityId>,
    ) -> CoreResult<Membership> {
        self.write_transaction(|txn| txn.reassign_membership_family(id, family_id))
    }

    // === Delete ===

    /// Deletes a family and its memberships.
    ///
    /// # Errors
    ///
    /// `EntityNotFound`.
    pub fn delete_family(&self, id: EntityId) -> CoreResult<DeletionReport> {
        self.write_transaction(|txn| txn.delete_family(id))
    }

    /// Deletes a user profile according to the configured policy.
    ///
    /// # Errors
    ///
    /// `EntityNotFound`, or `InvalidData` under `Forbid`.
    pub fn delete_user_profile(&self, id: EntityId) -> CoreResult<DeletionReport> {
        self.write_transaction(|txn| txn.delete_user_profile(id))
    }

    /// Hard-deletes a membership.
    ///
    /// # Errors
    ///
    /// `EntityNotFound`.
    pub fn delete_membership(&self, id: EntityId) -> CoreResult<()> {
        self.write_transaction(|txn| txn.delete_membership(id))
    }

    // === Relationship views ===

    /// Every membership of a family, active or removed, oldest first.
    #[must_use]
    pub fn family_memberships(&self, family_id: EntityId) -> Vec<Membership> {
        self.inner
            .read()
            .state
            .family_memberships(family_id)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Active memberships of a family, oldest first, with names resolved.
    #[must_use]
    pub fn active_members(&self, family_id: EntityId) -> Vec<MembershipView> {
        let inner = self.inner.read();
        inner
            .state
            .family_memberships(family_id)
            .into_iter()
            .filter(|m| m.is_active())
            .map(|m| inner.state.view(m))
            .collect()
    }

    /// True if the family has an active `parentAdmin` membership.
    #[must_use]
    pub fn has_parent_admin(&self, family_id: EntityId) -> bool {
        self.parent_admin(family_id).is_some()
    }

    /// The family's active `parentAdmin` membership; the earliest joined
    /// when there are several.
    #[must_use]
    pub fn parent_admin(&self, family_id: EntityId) -> Option<Membership> {
        self.inner
            .read()
            .state
            .family_memberships(family_id)
            .into_iter()
            .find(|m| m.is_active() && m.is_parent_admin())
            .cloned()
    }

    /// Every membership of a user, active or removed, oldest first.
    #[must_use]
    pub fn user_memberships(&self, user_id: EntityId) -> Vec<Membership> {
        self.inner
            .read()
            .state
            .user_memberships(user_id)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Active memberships of a user, oldest first.
    #[must_use]
    pub fn active_memberships(&self, user_id: EntityId) -> Vec<Membership> {
        self.inner
            .read()
            .state
            .user_memberships(user_id)
            .into_iter()
            .filter(|m| m.is_active())
            .cloned()
            .collect()
    }

    /// A membership with its family name and user display name resolved.
    #[must_use]
    pub fn membership_view(&self, id: EntityId) -> Option<MembershipView> {
        let inner = self.inner.read();
        inner.state.membership(id).map(|m| inner.state.view(m))
    }

    // === Sync state ===

    /// Records of `kind` flagged `needs_sync`, in id order.
    #[must_use]
    pub fn pending_sync(&self, kind: EntityKind) -> Vec<Record> {
        self.inner
            .read()
            .state
            .records(kind)
            .into_iter()
            .filter(|r| r.sync().needs_sync)
            .collect()
    }

    /// Sync metadata of a record.
    #[must_use]
    pub fn sync_metadata(&self, kind: EntityKind, id: EntityId) -> Option<SyncMetadata> {
        self.inner
            .read()
            .state
            .get(kind, id)
            .map(|r| r.sync().clone())
    }

    /// Records a confirmed push. See [`WriteTransaction::mark_synced`].
    ///
    /// # Errors
    ///
    /// `EntityNotFound`.
    pub fn mark_synced(
        &self,
        kind: EntityKind,
        id: EntityId,
        remote_id: RemoteId,
        at: Timestamp,
        expected_revision: u64,
    ) -> CoreResult<bool> {
        self.write_transaction(|txn| txn.mark_synced(kind, id, remote_id, at, expected_revision))
    }

    /// Overwrites a record's sync metadata.
    ///
    /// # Errors
    ///
    /// `EntityNotFound`.
    pub fn import_sync_metadata(
        &self,
        kind: EntityKind,
        id: EntityId,
        metadata: SyncMetadata,
    ) -> CoreResult<()> {
        self.write_transaction(|txn| txn.import_sync_metadata(kind, id, metadata))
    }

    /// Re-queues the half-synced records of `kind`.
    /// See [`WriteTransaction::recover_partial_migrations`].
    ///
    /// # Errors
    ///
    /// Returns an error if the recovery could not be committed; no record
    /// is changed in that case.
    pub fn recover_partial_migrations(&self, kind: EntityKind) -> CoreResult<RecoveryReport> {
        self.write_transaction(|txn| txn.recover_partial_migrations(kind))
    }

    /// Recovers every kind, in sync order.
    ///
    /// # Errors
    ///
    /// As for [`recover_partial_migrations`](Self::recover_partial_migrations).
    pub fn recover_all_partial_migrations(&self) -> CoreResult<Vec<RecoveryReport>> {
        self.write_transaction(|txn| {
            EntityKind::ALL
                .into_iter()
                .map(|kind| txn.recover_partial_migrations(kind))
                .collect()
        })
    }

    /// Applies a remote version of a record. See
    /// [`WriteTransaction::apply_remote`].
    ///
    /// # Errors
    ///
    /// `ConstraintViolation` on a unique-key collision.
    pub fn apply_remote(
        &self,
        record: Record,
        remote_id: RemoteId,
        at: Timestamp,
        expected_revision: Option<u64>,
    ) -> CoreResult<bool> {
        self.write_transaction(|txn| txn.apply_remote(record, remote_id, at, expected_revision))
    }

    /// Approximate heap footprint of the decoded records and indexes.
    #[must_use]
    pub fn estimated_bytes(&self) -> usize {
        self.inner.read().state.estimated_bytes()
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl std::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("EntityStore")
            .field("families", &inner.state.count(EntityKind::Family))
            .field("user_profiles", &inner.state.count(EntityKind::UserProfile))
            .field("memberships", &inner.state.count(EntityKind::Membership))
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinsync_storage::InMemoryBackend;

    fn seeded() -> (EntityStore, UserProfile, Family) {
        let store = EntityStore::in_memory();
        let user = store
            .create_user_profile(UserProfile::new("Sam", "hash-sam"))
            .unwrap();
        let family = store
            .create_family(Family::new("Test Family", "TEST123", user.id))
            .unwrap();
        (store, user, family)
    }

    #[test]
    fn create_and_fetch() {
        let (store, user, family) = seeded();
        assert_eq!(store.fetch_family(family.id), Some(family.clone()));
        assert_eq!(store.fetch_user_profile(user.id), Some(user));
        assert_eq!(store.count(EntityKind::Family), 1);
        assert_eq!(store.stats().creates, 2);
    }

    #[test]
    fn lookup_keys() {
        let (store, user, family) = seeded();
        assert_eq!(
            store.fetch_family_by_code("TEST123").unwrap().map(|f| f.id),
            Some(family.id)
        );
        assert_eq!(store.fetch_family_by_code("NOPE").unwrap(), None);
        assert!(store.fetch_family_by_code("").unwrap_err().is_invalid_data());
        assert_eq!(
            store
                .fetch_user_profile_by_apple_user_id_hash("hash-sam")
                .unwrap()
                .map(|u| u.id),
            Some(user.id)
        );
        assert!(store
            .fetch_user_profile_by_apple_user_id_hash("")
            .unwrap_err()
            .is_invalid_data());
    }

    #[test]
    fn duplicate_code_is_rejected() {
        let (store, user, _) = seeded();
        let err = store
            .create_family(Family::new("Other", "TEST123", user.id))
            .unwrap_err();
        assert!(err.is_constraint_violation());
        assert_eq!(store.count(EntityKind::Family), 1);
        assert_eq!(store.stats().constraint_violations, 1);
    }

    #[test]
    fn failed_closure_rolls_back() {
        let (store, user, _) = seeded();
        let result: CoreResult<()> = store.write_transaction(|txn| {
            txn.create_family(Family::new("Second", "SECOND", user.id))?;
            Err(CoreError::invalid_data("abort"))
        });
        assert!(result.is_err());
        assert_eq!(store.count(EntityKind::Family), 1);
        assert!(store.fetch_family_by_code("SECOND").unwrap().is_none());
        assert_eq!(store.stats().transactions_aborted, 1);
    }

    #[test]
    fn dropped_transaction_rolls_back() {
        let (store, user, _) = seeded();
        {
            let mut txn = store.begin_write();
            txn.create_family(Family::new("Dropped", "DROP1", user.id))
                .unwrap();
            assert_eq!(txn.count(EntityKind::Family), 2);
        }
        assert_eq!(store.count(EntityKind::Family), 1);
    }

    #[test]
    fn rejected_commit_restores_memory() {
        let backend = InMemoryBackend::new();
        let switch = backend.commit_switch();
        let store = EntityStore::open(Box::new(backend), StoreConfig::default()).unwrap();
        let user = store
            .create_user_profile(UserProfile::new("Sam", "hash-sam"))
            .unwrap();

        switch.reject_commits(true);
        let err = store
            .create_family(Family::new("Lost", "LOST1", user.id))
            .unwrap_err();
        assert!(matches!(err, CoreError::Storage(_)));
        assert_eq!(store.count(EntityKind::Family), 0);

        switch.reject_commits(false);
        assert!(store
            .create_family(Family::new("Kept", "LOST1", user.id))
            .is_ok());
    }

    #[test]
    fn batch_results_are_per_item() {
        let (store, user, _) = seeded();
        let results = store
            .create_families(vec![
                Family::new("A", "A1", user.id),
                Family::new("Dup", "TEST123", user.id),
                Family::new("", "B1", user.id),
                Family::new("C", "C1", user.id),
            ])
            .unwrap();
        assert!(results[0].is_ok());
        assert!(results[1].as_ref().unwrap_err().is_constraint_violation());
        assert!(results[2].as_ref().unwrap_err().is_invalid_data());
        assert!(results[3].is_ok());
        assert_eq!(store.count(EntityKind::Family), 3);
    }

    #[test]
    fn oversized_batch_is_rejected() {
        let store = EntityStore::with_config(StoreConfig::new().max_batch_size(1));
        let creator = EntityId::new();
        let err = store
            .create_families(vec![
                Family::new("A", "A1", creator),
                Family::new("B", "B1", creator),
            ])
            .unwrap_err();
        assert!(err.is_invalid_data());
        assert_eq!(store.count(EntityKind::Family), 0);
    }
}
