//! Decoded in-memory state of the entity store.

use super::relationships::RelationshipTable;
use crate::entity::EntityId;
use crate::error::{CoreError, CoreResult};
use crate::model::{Family, Membership, MembershipView, Record, UserProfile};
use crate::types::EntityKind;
use std::collections::{BTreeMap, HashMap};

/// Every record, the unique-key indexes and the relationship table.
///
/// `put` and `remove` are the only mutators and keep all three in step.
#[derive(Debug, Default, Clone)]
pub(crate) struct StoreState {
    families: BTreeMap<EntityId, Family>,
    user_profiles: BTreeMap<EntityId, UserProfile>,
    memberships: BTreeMap<EntityId, Membership>,
    family_codes: HashMap<String, EntityId>,
    apple_user_id_hashes: HashMap<String, EntityId>,
    relationships: RelationshipTable,
}

impl StoreState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    // === Lookup ===

    pub(crate) fn family(&self, id: EntityId) -> Option<&Family> {
        self.families.get(&id)
    }

    pub(crate) fn user_profile(&self, id: EntityId) -> Option<&UserProfile> {
        self.user_profiles.get(&id)
    }

    pub(crate) fn membership(&self, id: EntityId) -> Option<&Membership> {
        self.memberships.get(&id)
    }

    pub(crate) fn family_by_code(&self, code: &str) -> Option<&Family> {
        self.family_codes
            .get(code)
            .and_then(|id| self.families.get(id))
    }

    pub(crate) fn user_profile_by_hash(&self, hash: &str) -> Option<&UserProfile> {
        self.apple_user_id_hashes
            .get(hash)
            .and_then(|id| self.user_profiles.get(id))
    }

    pub(crate) fn get(&self, kind: EntityKind, id: EntityId) -> Option<Record> {
        match kind {
            EntityKind::Family => self.family(id).cloned().map(Record::from),
            EntityKind::UserProfile => self.user_profile(id).cloned().map(Record::from),
            EntityKind::Membership => self.membership(id).cloned().map(Record::from),
        }
    }

    pub(crate) fn contains(&self, kind: EntityKind, id: EntityId) -> bool {
        match kind {
            EntityKind::Family => self.families.contains_key(&id),
            EntityKind::UserProfile => self.user_profiles.contains_key(&id),
            EntityKind::Membership => self.memberships.contains_key(&id),
        }
    }

    pub(crate) fn families(&self) -> impl Iterator<Item = &Family> {
        self.families.values()
    }

    pub(crate) fn user_profiles(&self) -> impl Iterator<Item = &UserProfile> {
        self.user_profiles.values()
    }

    pub(crate) fn memberships(&self) -> impl Iterator<Item = &Membership> {
        self.memberships.values()
    }

    /// Every record of `kind`, in id order.
    pub(crate) fn records(&self, kind: EntityKind) -> Vec<Record> {
        match kind {
            EntityKind::Family => self.families().cloned().map(Record::from).collect(),
            EntityKind::UserProfile => self.user_profiles().cloned().map(Record::from).collect(),
            EntityKind::Membership => self.memberships().cloned().map(Record::from).collect(),
        }
    }

    pub(crate) fn count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Family => self.families.len(),
            EntityKind::UserProfile => self.user_profiles.len(),
            EntityKind::Membership => self.memberships.len(),
        }
    }

    // === Relationship views ===

    /// Memberships referencing `family_id`, oldest first.
    pub(crate) fn family_memberships(&self, family_id: EntityId) -> Vec<&Membership> {
        self.collect_memberships(self.relationships.family_memberships(family_id))
    }

    /// Memberships referencing `user_id`, oldest first.
    pub(crate) fn user_memberships(&self, user_id: EntityId) -> Vec<&Membership> {
        self.collect_memberships(self.relationships.user_memberships(user_id))
    }

    fn collect_memberships(&self, ids: Vec<EntityId>) -> Vec<&Membership> {
        let mut memberships: Vec<&Membership> = ids
            .into_iter()
            .filter_map(|id| self.memberships.get(&id))
            .collect();
        memberships.sort_by_key(|m| (m.joined_at, m.id));
        memberships
    }

    /// Resolves the denormalised names of a membership.
    pub(crate) fn view(&self, membership: &Membership) -> MembershipView {
        MembershipView {
            membership: membership.clone(),
            family_name: membership
                .family_id
                .and_then(|id| self.families.get(&id))
                .map(|f| f.name.clone()),
            user_display_name: membership
                .user_id
                .and_then(|id| self.user_profiles.get(&id))
                .map(|u| u.display_name.clone()),
        }
    }

    // === Mutation ===

    /// Fails if a unique key of `record` is held by a different record.
    pub(crate) fn check_unique(&self, record: &Record) -> CoreResult<()> {
        match record {
            Record::Family(family) => match self.family_codes.get(&family.code) {
                Some(owner) if *owner != family.id => Err(CoreError::constraint_violation(
                    EntityKind::Family,
                    "code",
                    family.code.clone(),
                )),
                _ => Ok(()),
            },
            Record::UserProfile(user) => match self.apple_user_id_hashes.get(&user.apple_user_id_hash) {
                Some(owner) if *owner != user.id => Err(CoreError::constraint_violation(
                    EntityKind::UserProfile,
                    "apple_user_id_hash",
                    user.apple_user_id_hash.clone(),
                )),
                _ => Ok(()),
            },
            Record::Membership(_) => Ok(()),
        }
    }

    /// Inserts or replaces a record, returning the previous version.
    pub(crate) fn put(&mut self, record: Record) -> Option<Record> {
        let previous = self.remove(record.kind(), record.id());
        match record {
            Record::Family(family) => {
                self.family_codes.insert(family.code.clone(), family.id);
                self.families.insert(family.id, family);
            }
            Record::UserProfile(user) => {
                self.apple_user_id_hashes
                    .insert(user.apple_user_id_hash.clone(), user.id);
                self.user_profiles.insert(user.id, user);
            }
            Record::Membership(membership) => {
                self.relationships.link(&membership);
                self.memberships.insert(membership.id, membership);
            }
        }
        previous
    }

    /// Removes a record together with its index entries.
    pub(crate) fn remove(&mut self, kind: EntityKind, id: EntityId) -> Option<Record> {
        match kind {
            EntityKind::Family => {
                let family = self.families.remove(&id)?;
                if self.family_codes.get(&family.code) == Some(&id) {
                    self.family_codes.remove(&family.code);
                }
                Some(Record::Family(family))
            }
            EntityKind::UserProfile => {
                let user = self.user_profiles.remove(&id)?;
                if self.apple_user_id_hashes.get(&user.apple_user_id_hash) == Some(&id) {
                    self.apple_user_id_hashes.remove(&user.apple_user_id_hash);
                }
                Some(Record::UserProfile(user))
            }
            EntityKind::Membership => {
                let membership = self.memberships.remove(&id)?;
                self.relationships.unlink(&membership);
                Some(Record::Membership(membership))
            }
        }
    }

    pub(crate) fn estimated_bytes(&self) -> usize {
        let records: usize = self
            .families
            .values()
            .map(Family::approximate_size)
            .chain(self.user_profiles.values().map(UserProfile::approximate_size))
            .chain(self.memberships.values().map(Membership::approximate_size))
            .sum();
        records + self.relationships.edge_count() * 2 * std::mem::size_of::<EntityId>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MembershipRole;

    #[test]
    fn put_replaces_index_entries() {
        let mut state = StoreState::new();
        let mut family = Family::new("Smiths", "SMITH1", EntityId::new());
        state.put(family.clone().into());
        assert!(state.family_by_code("SMITH1").is_some());

        family.code = "SMITH2".into();
        let previous = state.put(family.clone().into());
        assert!(previous.is_some());
        assert!(state.family_by_code("SMITH1").is_none());
        assert_eq!(state.family_by_code("SMITH2").map(|f| f.id), Some(family.id));
        assert_eq!(state.count(EntityKind::Family), 1);
    }

    #[test]
    fn unique_check_ignores_self() {
        let mut state = StoreState::new();
        let family = Family::new("Smiths", "SMITH1", EntityId::new());
        state.put(family.clone().into());

        assert!(state.check_unique(&family.clone().into()).is_ok());
        let other = Family::new("Jones", "SMITH1", EntityId::new());
        let err = state.check_unique(&other.into()).unwrap_err();
        assert!(err.is_constraint_violation());
    }

    #[test]
    fn views_follow_relationships() {
        let mut state = StoreState::new();
        let user = UserProfile::new("Sam", "hash-sam");
        let family = Family::new("Test Family", "TEST123", user.id);
        let membership = Membership::new(family.id, user.id, MembershipRole::ParentAdmin);
        state.put(user.clone().into());
        state.put(family.clone().into());
        state.put(membership.clone().into());

        assert_eq!(state.family_memberships(family.id).len(), 1);
        assert_eq!(state.user_memberships(user.id).len(), 1);

        let view = state.view(&membership);
        assert_eq!(view.family_name(), Some("Test Family"));
        assert_eq!(view.user_display_name(), Some("Sam"));

        state.remove(EntityKind::Membership, membership.id);
        assert!(state.family_memberships(family.id).is_empty());
        assert!(state.user_memberships(user.id).is_empty());
    }
}
