//! Family records.

use crate::entity::EntityId;
use crate::model::SyncMetadata;
use crate::types::Timestamp;
use crate::validation;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A household grouping identified by a unique join code.
///
/// Memberships are not stored on the family; they are looked up through
/// the store's relationship table (`EntityStore::family_memberships`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Family {
    /// Record identity.
    pub id: EntityId,
    /// Display name of the family.
    pub name: String,
    /// Join code, unique across all families.
    pub code: String,
    /// The user who created the family.
    pub created_by_user_id: EntityId,
    /// Creation time.
    pub created_at: Timestamp,
    /// Sync bookkeeping.
    pub sync: SyncMetadata,
}

impl Family {
    /// Constructs a new local family with a fresh id, dirty for sync.
    pub fn new(
        name: impl Into<String>,
        code: impl Into<String>,
        created_by_user_id: EntityId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(),
            name: name.into(),
            code: code.into(),
            created_by_user_id,
            created_at: now,
            sync: SyncMetadata::new_local(now),
        }
    }

    /// True if the name is non-empty.
    #[must_use]
    pub fn is_name_valid(&self) -> bool {
        validation::is_name_valid(&self.name)
    }

    /// True if the code is non-empty.
    #[must_use]
    pub fn is_code_valid(&self) -> bool {
        validation::is_code_valid(&self.code)
    }

    /// True if every field validation passes.
    #[must_use]
    pub fn is_fully_valid(&self) -> bool {
        self.is_name_valid() && self.is_code_valid()
    }

    pub(crate) fn approximate_size(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.name.len()
            + self.code.len()
            + self.sync.remote_id.as_ref().map_or(0, |r| r.as_str().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_family_is_dirty_and_valid() {
        let creator = EntityId::new();
        let family = Family::new("Test Family", "TEST123", creator);

        assert!(family.is_fully_valid());
        assert!(family.sync.needs_sync);
        assert_eq!(family.created_by_user_id, creator);
        assert_eq!(family.sync.modified_at, family.created_at);
    }

    #[test]
    fn validity_tracks_in_memory_edits() {
        let mut family = Family::new("Test Family", "TEST123", EntityId::new());
        family.code.clear();
        assert!(!family.is_code_valid());
        assert!(!family.is_fully_valid());
        assert!(family.is_name_valid());
    }
}
