//! Sync-state tracker types.
//!
//! The operations live on [`WriteTransaction`](crate::WriteTransaction) and
//! [`EntityStore`](crate::EntityStore); this module holds what they report.

use crate::entity::EntityId;
use crate::model::RemoteId;
use crate::types::EntityKind;
use uuid::Uuid;

/// Outcome of a partial-migration recovery pass over one kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Kind that was scanned.
    pub kind: EntityKind,
    /// Records examined.
    pub inspected: usize,
    /// Records that were missing a remote field and have been re-queued.
    pub recovered: Vec<EntityId>,
}

impl RecoveryReport {
    pub(crate) fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            inspected: 0,
            recovered: Vec::new(),
        }
    }

    /// Number of records re-queued for sync.
    #[must_use]
    pub fn recovered_count(&self) -> usize {
        self.recovered.len()
    }

    /// True if nothing needed recovery.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.recovered.is_empty()
    }
}

/// Builds a recovery placeholder: `{prefix}-{kind}-{uuid}`.
pub(crate) fn placeholder_remote_id(prefix: &str, kind: EntityKind) -> RemoteId {
    RemoteId::new(format!("{prefix}-{kind}-{}", Uuid::new_v4()))
}

/// Outcome of a delete, listing the memberships it touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionReport {
    /// Kind of the deleted record.
    pub kind: EntityKind,
    /// Id of the deleted record.
    pub id: EntityId,
    /// Memberships hard-deleted along with it.
    pub cascaded: Vec<EntityId>,
    /// Memberships whose reference to it was cleared.
    pub orphaned: Vec<EntityId>,
}

impl DeletionReport {
    pub(crate) fn new(kind: EntityKind, id: EntityId) -> Self {
        Self {
            kind,
            id,
            cascaded: Vec::new(),
            orphaned: Vec::new(),
        }
    }
}
