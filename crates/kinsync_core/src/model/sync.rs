//! Per-record sync metadata.

use crate::types::Timestamp;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier assigned to a record by the remote system
/// (the ckRecordID of the cloud store).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(String);

impl RemoteId {
    /// Wraps a remote identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Position of a record in the sync state machine.
///
/// ```text
/// Unsynced ──push──▶ Synced
///    │                 │ local write
///    ▼                 ▼
/// PendingPush ◀────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Never pushed: dirty and without a remote id.
    Unsynced,
    /// Has a remote id but local changes (or an incomplete sync) remain.
    PendingPush,
    /// Clean, with a remote id and a sync date.
    Synced,
}

/// Sync bookkeeping carried by every record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMetadata {
    /// Dirty flag: local changes not yet confirmed by the remote.
    pub needs_sync: bool,
    /// Remote identifier, set after the first push.
    pub remote_id: Option<RemoteId>,
    /// Time of the last confirmed remote sync.
    pub last_sync_date: Option<Timestamp>,
    /// Time of the last modification (local or applied from remote).
    pub modified_at: Timestamp,
    /// Local write counter.
    pub revision: u64,
}

impl SyncMetadata {
    /// Metadata for a freshly constructed local record.
    #[must_use]
    pub fn new_local(now: Timestamp) -> Self {
        Self {
            needs_sync: true,
            remote_id: None,
            last_sync_date: None,
            modified_at: now,
            revision: 0,
        }
    }

    /// Neutral metadata used when encoding replicated content.
    #[must_use]
    pub(crate) fn content_only() -> Self {
        Self {
            needs_sync: false,
            remote_id: None,
            last_sync_date: None,
            modified_at: Timestamp::default(),
            revision: 0,
        }
    }

    /// Returns the state-machine position.
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        match (&self.remote_id, self.last_sync_date) {
            (Some(_), Some(_)) if !self.needs_sync => SyncStatus::Synced,
            (Some(_), _) => SyncStatus::PendingPush,
            (None, _) => SyncStatus::Unsynced,
        }
    }

    /// Records a local mutation.
    pub fn mark_dirty(&mut self) {
        self.needs_sync = true;
        self.modified_at = Utc::now();
        self.revision += 1;
    }

    /// Records a confirmed remote sync.
    pub fn mark_synced(&mut self, remote_id: RemoteId, at: Timestamp) {
        self.needs_sync = false;
        self.remote_id = Some(remote_id);
        self.last_sync_date = Some(at);
    }

    /// True when either remote field is missing, as left behind by an
    /// interrupted migration or first sync.
    #[must_use]
    pub fn is_partially_synced(&self) -> bool {
        self.remote_id.is_none() || self.last_sync_date.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_local_is_unsynced() {
        let meta = SyncMetadata::new_local(Utc::now());
        assert!(meta.needs_sync);
        assert_eq!(meta.status(), SyncStatus::Unsynced);
        assert!(meta.is_partially_synced());
    }

    #[test]
    fn synced_then_dirty_is_pending_push() {
        let mut meta = SyncMetadata::new_local(Utc::now());
        meta.mark_synced(RemoteId::new("rec-1"), Utc::now());
        assert_eq!(meta.status(), SyncStatus::Synced);
        assert!(!meta.is_partially_synced());

        meta.mark_dirty();
        assert!(meta.needs_sync);
        assert_eq!(meta.revision, 1);
        assert_eq!(meta.status(), SyncStatus::PendingPush);
    }

    #[test]
    fn remote_id_without_date_is_pending() {
        let mut meta = SyncMetadata::new_local(Utc::now());
        meta.remote_id = Some(RemoteId::new("rec-2"));
        meta.needs_sync = false;
        assert_eq!(meta.status(), SyncStatus::PendingPush);
    }
}
