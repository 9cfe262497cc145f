//! Membership records linking user profiles to families.

use crate::entity::EntityId;
use crate::model::SyncMetadata;
use crate::types::Timestamp;
use crate::validation;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a user inside a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MembershipRole {
    /// Administrator with elevated privileges.
    ParentAdmin,
    /// Adult member.
    Adult,
    /// Child member.
    Kid,
    /// Temporary guest.
    Visitor,
}

impl fmt::Display for MembershipRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MembershipRole::ParentAdmin => "parentAdmin",
            MembershipRole::Adult => "adult",
            MembershipRole::Kid => "kid",
            MembershipRole::Visitor => "visitor",
        };
        f.write_str(name)
    }
}

/// Lifecycle status of a membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MembershipStatus {
    /// Counted in active views.
    Active,
    /// Soft-removed: kept for history, excluded from active views.
    Removed,
}

/// Join record between a family and a user profile.
///
/// Both references are optional because memberships can exist half-built
/// during construction or migration; such a membership is not
/// [`is_valid`](Membership::is_valid).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    /// Record identity.
    pub id: EntityId,
    /// Role inside the family.
    pub role: MembershipRole,
    /// Active or soft-removed.
    pub status: MembershipStatus,
    /// When the user joined.
    pub joined_at: Timestamp,
    /// The family this membership belongs to.
    pub family_id: Option<EntityId>,
    /// The user this membership belongs to.
    pub user_id: Option<EntityId>,
    /// Sync bookkeeping.
    pub sync: SyncMetadata,
}

impl Membership {
    /// Constructs an active membership linking `family_id` and `user_id`.
    #[must_use]
    pub fn new(family_id: EntityId, user_id: EntityId, role: MembershipRole) -> Self {
        let mut membership = Self::unlinked(role);
        membership.family_id = Some(family_id);
        membership.user_id = Some(user_id);
        membership
    }

    /// Constructs an active membership with no references yet.
    #[must_use]
    pub fn unlinked(role: MembershipRole) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(),
            role,
            status: MembershipStatus::Active,
            joined_at: now,
            family_id: None,
            user_id: None,
            sync: SyncMetadata::new_local(now),
        }
    }

    /// True iff both the family and the user reference are set.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.family_id.is_some() && self.user_id.is_some()
    }

    /// True if the role is `parentAdmin`.
    #[must_use]
    pub fn is_parent_admin(&self) -> bool {
        self.role == MembershipRole::ParentAdmin
    }

    /// True if the membership has not been soft-removed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == MembershipStatus::Active
    }

    pub(crate) fn approximate_size(&self) -> usize {
        std::mem::size_of::<Self>() + self.sync.remote_id.as_ref().map_or(0, |r| r.as_str().len())
    }
}

/// A membership resolved against the store, carrying the denormalised
/// names of the family and user it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipView {
    /// The underlying record.
    pub membership: Membership,
    /// Name of the referenced family, if it resolves.
    pub family_name: Option<String>,
    /// Display name of the referenced user, if it resolves.
    pub user_display_name: Option<String>,
}

impl MembershipView {
    /// Id of the referenced family.
    #[must_use]
    pub fn family_id(&self) -> Option<EntityId> {
        self.membership.family_id
    }

    /// Id of the referenced user.
    #[must_use]
    pub fn user_id(&self) -> Option<EntityId> {
        self.membership.user_id
    }

    /// Name of the referenced family.
    #[must_use]
    pub fn family_name(&self) -> Option<&str> {
        self.family_name.as_deref()
    }

    /// Display name of the referenced user.
    #[must_use]
    pub fn user_display_name(&self) -> Option<&str> {
        self.user_display_name.as_deref()
    }

    /// True iff both references are set.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.membership.is_valid()
    }

    /// True iff both references are set and both denormalised names pass
    /// their field validations. The role is an enum and always set.
    #[must_use]
    pub fn is_fully_valid(&self) -> bool {
        self.is_valid()
            && self.family_name().is_some_and(validation::is_name_valid)
            && self
                .user_display_name()
                .is_some_and(validation::is_display_name_valid)
    }
}
