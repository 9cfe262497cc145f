//! Core type definitions for KinSync.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wall-clock timestamp used for `created_at`, `modified_at` and sync dates.
pub type Timestamp = DateTime<Utc>;

/// The three kinds of records held by the entity store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A household grouping.
    Family,
    /// A person using the app.
    UserProfile,
    /// The join record between a family and a user.
    Membership,
}

impl EntityKind {
    /// Every kind, in the order records should be synced (referenced
    /// records before the memberships pointing at them).
    pub const ALL: [EntityKind; 3] = [
        EntityKind::UserProfile,
        EntityKind::Family,
        EntityKind::Membership,
    ];

    /// Returns the storage collection name for this kind.
    #[must_use]
    pub const fn collection_name(self) -> &'static str {
        match self {
            EntityKind::Family => "family",
            EntityKind::UserProfile => "user_profile",
            EntityKind::Membership => "membership",
        }
    }

    /// Parses a storage collection name.
    #[must_use]
    pub fn from_collection_name(name: &str) -> Option<Self> {
        match name {
            "family" => Some(EntityKind::Family),
            "user_profile" => Some(EntityKind::UserProfile),
            "membership" => Some(EntityKind::Membership),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_names_roundtrip() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::from_collection_name(kind.collection_name()), Some(kind));
        }
        assert_eq!(EntityKind::from_collection_name("households"), None);
    }

    #[test]
    fn sync_order_puts_memberships_last() {
        assert_eq!(EntityKind::ALL[2], EntityKind::Membership);
    }

    #[test]
    fn kind_display() {
        assert_eq!(EntityKind::UserProfile.to_string(), "user_profile");
    }
}
