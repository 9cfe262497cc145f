//! Property-based test generators using proptest.
//!
//! Provides strategies for generating records and household shapes that
//! satisfy the store's validation rules, plus a few that deliberately do
//! not.

use kinsync_core::{
    CoreResult, EntityId, EntityStore, Family, FamilyUpdate, Membership, MembershipRole, UserProfile,
};
use proptest::prelude::*;
use std::collections::BTreeSet;

/// Strategy for generating entity IDs.
pub fn entity_id_strategy() -> impl Strategy<Value = EntityId> {
    prop::array::uniform16(any::<u8>()).prop_map(EntityId::from_bytes)
}

/// Strategy for non-blank display or family names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z][A-Za-z0-9 '-]{0,23}").expect("Invalid regex")
}

/// Strategy for family join codes.
pub fn family_code_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z0-9]{4,10}").expect("Invalid regex")
}

/// Strategy for opaque Apple user id hashes.
pub fn apple_user_id_hash_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[0-9a-f]{16,64}").expect("Invalid regex")
}

/// Strategy for strings that fail the non-empty checks: empty or
/// whitespace only.
pub fn blank_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[ \t\n]{0,4}").expect("Invalid regex")
}

/// Strategy for membership roles.
pub fn role_strategy() -> impl Strategy<Value = MembershipRole> {
    prop_oneof![
        Just(MembershipRole::ParentAdmin),
        Just(MembershipRole::Adult),
        Just(MembershipRole::Kid),
        Just(MembershipRole::Visitor),
    ]
}

/// Strategy for valid user profiles.
pub fn user_profile_strategy() -> impl Strategy<Value = UserProfile> {
    (name_strategy(), apple_user_id_hash_strategy())
        .prop_map(|(name, hash)| UserProfile::new(name, hash))
}

/// Strategy for valid families created by `creator`.
pub fn family_strategy(creator: EntityId) -> impl Strategy<Value = Family> {
    (name_strategy(), family_code_strategy())
        .prop_map(move |(name, code)| Family::new(name, code, creator))
}

/// Strategy for `count` pairwise distinct family codes, `count` drawn
/// from `range`.
pub fn distinct_codes_strategy(
    range: std::ops::Range<usize>,
) -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set(family_code_strategy(), range)
}

/// Shape of a generated household set: one entry per family, listing the
/// roles of its members.
#[derive(Debug, Clone)]
pub struct HouseholdPlan {
    /// Member roles, per family.
    pub families: Vec<Vec<MembershipRole>>,
}

impl HouseholdPlan {
    /// Total number of memberships in the plan.
    pub fn membership_count(&self) -> usize {
        self.families.iter().map(Vec::len).sum()
    }

    /// Creates the planned records in `store`: one owner, one user per
    /// member, family codes `PLAN0`, `PLAN1`, ... Returns the family ids in
    /// plan order.
    pub fn build(&self, store: &EntityStore) -> Vec<EntityId> {
        let owner = store
            .create_user_profile(UserProfile::new("Owner", "hash-plan-owner"))
            .expect("Failed to create owner");

        let mut family_ids = Vec::with_capacity(self.families.len());
        for (f, roles) in self.families.iter().enumerate() {
            let family = store
                .create_family(Family::new(format!("Plan {f}"), format!("PLAN{f}"), owner.id))
                .expect("Failed to create family");
            for (m, role) in roles.iter().enumerate() {
                let user = store
                    .create_user_profile(UserProfile::new(
                        format!("Member {f}-{m}"),
                        format!("hash-plan-{f}-{m}"),
                    ))
                    .expect("Failed to create member");
                store
                    .create_membership(Membership::new(family.id, user.id, *role))
                    .expect("Failed to create membership");
            }
            family_ids.push(family.id);
        }
        family_ids
    }
}

/// Strategy for household plans of up to `max_families` families with up
/// to `max_members` members each.
pub fn household_plan_strategy(
    max_families: usize,
    max_members: usize,
) -> impl Strategy<Value = HouseholdPlan> {
    prop::collection::vec(
        prop::collection::vec(role_strategy(), 0..=max_members),
        1..=max_families.max(1),
    )
    .prop_map(|families| HouseholdPlan { families })
}

/// A local store operation, for sequences of mixed mutations.
#[derive(Debug, Clone)]
pub enum StoreOperation {
    /// Rename the family at this index.
    RenameFamily {
        /// Index into the plan's families.
        family: usize,
        /// New name.
        name: String,
    },
    /// Soft-remove the membership at this index.
    RemoveMembership {
        /// Index into the store's memberships.
        membership: usize,
    },
    /// Change the role of the membership at this index.
    ChangeRole {
        /// Index into the store's memberships.
        membership: usize,
        /// New role.
        role: MembershipRole,
    },
    /// Delete the family at this index.
    DeleteFamily {
        /// Index into the plan's families.
        family: usize,
    },
}

impl StoreOperation {
    /// Applies the operation. `families` are the candidate family ids;
    /// membership candidates are every membership in the store. Does
    /// nothing when there is no candidate.
    ///
    /// # Errors
    ///
    /// Whatever the store operation returns.
    pub fn apply(&self, store: &EntityStore, families: &[EntityId]) -> CoreResult<()> {
        let memberships = store.fetch_all_memberships();
        let pick_family = |i: usize| (!families.is_empty()).then(|| families[i % families.len()]);
        let pick_membership =
            |i: usize| (!memberships.is_empty()).then(|| memberships[i % memberships.len()].id);

        match self {
            StoreOperation::RenameFamily { family, name } => {
                if let Some(id) = pick_family(*family).filter(|id| store.fetch_family(*id).is_some()) {
                    store.update_family(id, FamilyUpdate::new().name(name.clone()))?;
                }
            }
            StoreOperation::RemoveMembership { membership } => {
                if let Some(id) = pick_membership(*membership) {
                    store.remove_membership(id)?;
                }
            }
            StoreOperation::ChangeRole { membership, role } => {
                if let Some(id) = pick_membership(*membership) {
                    store.set_membership_role(id, *role)?;
                }
            }
            StoreOperation::DeleteFamily { family } => {
                if let Some(id) = pick_family(*family).filter(|id| store.fetch_family(*id).is_some()) {
                    store.delete_family(id)?;
                }
            }
        }
        Ok(())
    }
}

/// Strategy for a single store operation. Indexes are taken modulo the
/// number of candidates when applied.
pub fn store_operation_strategy() -> impl Strategy<Value = StoreOperation> {
    prop_oneof![
        (any::<usize>(), name_strategy())
            .prop_map(|(family, name)| StoreOperation::RenameFamily { family, name }),
        any::<usize>().prop_map(|membership| StoreOperation::RemoveMembership { membership }),
        (any::<usize>(), role_strategy())
            .prop_map(|(membership, role)| StoreOperation::ChangeRole { membership, role }),
        any::<usize>().prop_map(|family| StoreOperation::DeleteFamily { family }),
    ]
}

/// Strategy for a sequence of store operations.
pub fn store_operations_strategy(max_ops: usize) -> impl Strategy<Value = Vec<StoreOperation>> {
    prop::collection::vec(store_operation_strategy(), 0..max_ops)
}
