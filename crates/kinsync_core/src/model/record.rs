//! Kind-erased record wrapper.

use crate::entity::EntityId;
use crate::model::{Family, Membership, SyncMetadata, UserProfile};
use crate::types::EntityKind;

/// Any record held by the entity store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// A family.
    Family(Family),
    /// A user profile.
    UserProfile(UserProfile),
    /// A membership.
    Membership(Membership),
}

impl Record {
    /// Returns the record kind.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        match self {
            Record::Family(_) => EntityKind::Family,
            Record::UserProfile(_) => EntityKind::UserProfile,
            Record::Membership(_) => EntityKind::Membership,
        }
    }

    /// Returns the record id.
    #[must_use]
    pub fn id(&self) -> EntityId {
        match self {
            Record::Family(f) => f.id,
            Record::UserProfile(u) => u.id,
            Record::Membership(m) => m.id,
        }
    }

    /// Returns the sync metadata.
    #[must_use]
    pub fn sync(&self) -> &SyncMetadata {
        match self {
            Record::Family(f) => &f.sync,
            Record::UserProfile(u) => &u.sync,
            Record::Membership(m) => &m.sync,
        }
    }

    /// Returns the sync metadata mutably.
    pub fn sync_mut(&mut self) -> &mut SyncMetadata {
        match self {
            Record::Family(f) => &mut f.sync,
            Record::UserProfile(u) => &mut u.sync,
            Record::Membership(m) => &mut m.sync,
        }
    }

    /// Returns the family if this is one.
    #[must_use]
    pub fn as_family(&self) -> Option<&Family> {
        match self {
            Record::Family(f) => Some(f),
            _ => None,
        }
    }

    /// Returns the user profile if this is one.
    #[must_use]
    pub fn as_user_profile(&self) -> Option<&UserProfile> {
        match self {
            Record::UserProfile(u) => Some(u),
            _ => None,
        }
    }

    /// Returns the membership if this is one.
    #[must_use]
    pub fn as_membership(&self) -> Option<&Membership> {
        match self {
            Record::Membership(m) => Some(m),
            _ => None,
        }
    }
}

impl From<Family> for Record {
    fn from(family: Family) -> Self {
        Record::Family(family)
    }
}

impl From<UserProfile> for Record {
    fn from(user: UserProfile) -> Self {
        Record::UserProfile(user)
    }
}

impl From<Membership> for Record {
    fn from(membership: Membership) -> Self {
        Record::Membership(membership)
    }
}
