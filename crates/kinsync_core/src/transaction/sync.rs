//! Sync-state tracker operations.

use super::WriteTransaction;
use crate::entity::EntityId;
use crate::error::{CoreError, CoreResult};
use crate::model::{Record, RemoteId, SyncMetadata};
use crate::sync_state::{placeholder_remote_id, RecoveryReport};
use crate::types::{EntityKind, Timestamp};
use chrono::Utc;
use tracing::{debug, info};

impl WriteTransaction<'_> {
    /// Records a confirmed push of `id`.
    ///
    /// `expected_revision` is the revision the pushed snapshot was taken
    /// at. If a local write happened since, the remote id is still stored
    /// but the record stays dirty so the newer write gets pushed too.
    ///
    /// Returns `true` if the record is now clean.
    ///
    /// # Errors
    ///
    /// `EntityNotFound` if the record does not exist.
    pub fn mark_synced(
        &mut self,
        kind: EntityKind,
        id: EntityId,
        remote_id: RemoteId,
        at: Timestamp,
        expected_revision: u64,
    ) -> CoreResult<bool> {
        let mut record = self
            .record(kind, id)
            .ok_or_else(|| CoreError::not_found(kind, id))?;

        let clean = record.sync().revision == expected_revision;
        if clean {
            record.sync_mut().mark_synced(remote_id, at);
        } else {
            record.sync_mut().remote_id = Some(remote_id);
        }
        self.stage_put(record)?;

        if clean {
            self.stats.record_marked_synced();
        }
        debug!(%kind, %id, clean, "sync confirmed");
        Ok(clean)
    }

    /// Overwrites a record's sync metadata verbatim.
    ///
    /// Intended for migrations importing state from an older store.
    ///
    /// # Errors
    ///
    /// `EntityNotFound` if the record does not exist.
    pub fn import_sync_metadata(
        &mut self,
        kind: EntityKind,
        id: EntityId,
        metadata: SyncMetadata,
    ) -> CoreResult<()> {
        let mut record = self
            .record(kind, id)
            .ok_or_else(|| CoreError::not_found(kind, id))?;
        *record.sync_mut() = metadata;
        self.stage_put(record)
    }

    /// Inserts or replaces a record keeping its sync metadata as given.
    ///
    /// Unlike the `create_*` operations this neither re-dirties the record
    /// nor checks field validity; unique keys are still enforced.
    ///
    /// # Errors
    ///
    /// `ConstraintViolation` if a unique key is held by another record.
    pub fn import_record(&mut self, record: Record) -> CoreResult<()> {
        self.inner
            .state
            .check_unique(&record)
            .map_err(|e| self.reject(e))?;
        let existed = self.inner.state.contains(record.kind(), record.id());
        self.stage_put(record)?;
        if existed {
            self.stats.record_update();
        } else {
            self.stats.record_create();
        }
        Ok(())
    }

    /// Re-queues every record of `kind` left half-synced by an
    /// interrupted migration.
    ///
    /// A record missing its remote id gets a placeholder id
    /// (`{prefix}-{kind}-{uuid}`); one missing its sync date gets the
    /// current time. Both are flagged `needs_sync`, so no recovered record
    /// ever reads as synced. Fully synced records are left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if staging a write fails.
    pub fn recover_partial_migrations(&mut self, kind: EntityKind) -> CoreResult<RecoveryReport> {
        let now = Utc::now();
        let mut report = RecoveryReport::new(kind);

        for mut record in self.records(kind) {
            report.inspected += 1;
            if !record.sync().is_partially_synced() {
                continue;
            }

            let sync = record.sync_mut();
            if sync.remote_id.is_none() {
                sync.remote_id = Some(placeholder_remote_id(&self.config.recovery_id_prefix, kind));
            }
            if sync.last_sync_date.is_none() {
                sync.last_sync_date = Some(now);
            }
            sync.needs_sync = true;

            report.recovered.push(record.id());
            self.stage_put(record)?;
        }

        self.stats.record_recovered(report.recovered.len() as u64);
        info!(
            %kind,
            inspected = report.inspected,
            recovered = report.recovered.len(),
            "partial migration recovery finished"
        );
        Ok(report)
    }

    /// Applies a remote version of a record and marks it clean.
    ///
    /// The record's content replaces the local one; its `modified_at` is
    /// kept as the remote recency. When `expected_revision` is set and the
    /// local record has been written since, nothing is applied and `false`
    /// is returned.
    ///
    /// # Errors
    ///
    /// `ConstraintViolation` if the remote version collides with another
    /// local record's unique key.
    pub fn apply_remote(
        &mut self,
        mut record: Record,
        remote_id: RemoteId,
        at: Timestamp,
        expected_revision: Option<u64>,
    ) -> CoreResult<bool> {
        let local_revision = self
            .record(record.kind(), record.id())
            .map(|local| local.sync().revision);

        if let (Some(local), Some(expected)) = (local_revision, expected_revision) {
            if local != expected {
                debug!(kind = %record.kind(), id = %record.id(), "remote apply skipped, local write raced");
                return Ok(false);
            }
        }

        self.inner
            .state
            .check_unique(&record)
            .map_err(|e| self.reject(e))?;

        let modified_at = record.sync().modified_at;
        *record.sync_mut() = SyncMetadata {
            needs_sync: false,
            remote_id: Some(remote_id),
            last_sync_date: Some(at),
            modified_at,
            revision: local_revision.unwrap_or(0),
        };

        let (kind, id) = (record.kind(), record.id());
        self.stage_put(record)?;
        self.stats.record_remote_apply();
        debug!(%kind, %id, "remote version applied");
        Ok(true)
    }
}
