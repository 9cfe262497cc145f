//! User profile records.

use crate::entity::EntityId;
use crate::model::SyncMetadata;
use crate::types::Timestamp;
use crate::validation;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A person using the app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Record identity.
    pub id: EntityId,
    /// Name shown to other family members.
    pub display_name: String,
    /// Opaque credential-derived key, unique across all profiles.
    pub apple_user_id_hash: String,
    /// Optional avatar location.
    pub avatar_url: Option<String>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Sync bookkeeping.
    pub sync: SyncMetadata,
}

impl UserProfile {
    /// Constructs a new local profile with a fresh id, dirty for sync.
    pub fn new(display_name: impl Into<String>, apple_user_id_hash: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(),
            display_name: display_name.into(),
            apple_user_id_hash: apple_user_id_hash.into(),
            avatar_url: None,
            created_at: now,
            sync: SyncMetadata::new_local(now),
        }
    }

    /// Sets the avatar URL.
    #[must_use]
    pub fn with_avatar_url(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = Some(url.into());
        self
    }

    /// True if the display name is non-empty.
    #[must_use]
    pub fn is_display_name_valid(&self) -> bool {
        validation::is_display_name_valid(&self.display_name)
    }

    /// True if the credential hash is non-empty.
    #[must_use]
    pub fn is_apple_user_id_hash_valid(&self) -> bool {
        validation::is_apple_user_id_hash_valid(&self.apple_user_id_hash)
    }

    /// True if every field validation passes.
    #[must_use]
    pub fn is_fully_valid(&self) -> bool {
        self.is_display_name_valid() && self.is_apple_user_id_hash_valid()
    }

    pub(crate) fn approximate_size(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.display_name.len()
            + self.apple_user_id_hash.len()
            + self.avatar_url.as_ref().map_or(0, String::len)
            + self.sync.remote_id.as_ref().map_or(0, |r| r.as_str().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_profile_defaults() {
        let user = UserProfile::new("Jamie", "hash-abc");
        assert!(user.is_fully_valid());
        assert!(user.avatar_url.is_none());
        assert!(user.sync.needs_sync);
    }

    #[test]
    fn avatar_builder() {
        let user = UserProfile::new("Jamie", "hash-abc").with_avatar_url("https://cdn/a.png");
        assert_eq!(user.avatar_url.as_deref(), Some("https://cdn/a.png"));
    }

    #[test]
    fn blank_hash_is_not_fully_valid() {
        let user = UserProfile::new("Jamie", "  ");
        assert!(user.is_display_name_valid());
        assert!(!user.is_fully_valid());
    }
}
