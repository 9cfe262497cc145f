//! Relationship table between memberships and the records they reference.
//!
//! Records never hold back-pointers. A family's or a user's memberships are
//! found through this table, which the store updates in the same write as
//! the membership itself.

use crate::entity::EntityId;
use crate::model::Membership;
use std::collections::{BTreeSet, HashMap};

/// Foreign-key index: referenced id → membership ids.
#[derive(Debug, Default, Clone)]
pub(crate) struct RelationshipTable {
    by_family: HashMap<EntityId, BTreeSet<EntityId>>,
    by_user: HashMap<EntityId, BTreeSet<EntityId>>,
}

impl RelationshipTable {
    /// Indexes the references held by `membership`.
    pub(crate) fn link(&mut self, membership: &Membership) {
        if let Some(family_id) = membership.family_id {
            self.by_family
                .entry(family_id)
                .or_default()
                .insert(membership.id);
        }
        if let Some(user_id) = membership.user_id {
            self.by_user.entry(user_id).or_default().insert(membership.id);
        }
    }

    /// Removes the references held by `membership` from the index.
    pub(crate) fn unlink(&mut self, membership: &Membership) {
        if let Some(family_id) = membership.family_id {
            remove_edge(&mut self.by_family, family_id, membership.id);
        }
        if let Some(user_id) = membership.user_id {
            remove_edge(&mut self.by_user, user_id, membership.id);
        }
    }

    /// Membership ids referencing `family_id`, in id order.
    pub(crate) fn family_memberships(&self, family_id: EntityId) -> Vec<EntityId> {
        self.by_family
            .get(&family_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Membership ids referencing `user_id`, in id order.
    pub(crate) fn user_memberships(&self, user_id: EntityId) -> Vec<EntityId> {
        self.by_user
            .get(&user_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    pub(crate) fn edge_count(&self) -> usize {
        self.by_family.values().map(BTreeSet::len).sum::<usize>()
            + self.by_user.values().map(BTreeSet::len).sum::<usize>()
    }
}

fn remove_edge(
    index: &mut HashMap<EntityId, BTreeSet<EntityId>>,
    target: EntityId,
    membership_id: EntityId,
) {
    if let Some(ids) = index.get_mut(&target) {
        ids.remove(&membership_id);
        if ids.is_empty() {
            index.remove(&target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MembershipRole;

    #[test]
    fn link_and_unlink() {
        let family = EntityId::new();
        let user = EntityId::new();
        let membership = Membership::new(family, user, MembershipRole::Adult);

        let mut table = RelationshipTable::default();
        table.link(&membership);
        assert_eq!(table.family_memberships(family), vec![membership.id]);
        assert_eq!(table.user_memberships(user), vec![membership.id]);
        assert_eq!(table.edge_count(), 2);

        table.unlink(&membership);
        assert!(table.family_memberships(family).is_empty());
        assert!(table.user_memberships(user).is_empty());
        assert_eq!(table.edge_count(), 0);
    }

    #[test]
    fn unlinked_membership_has_no_edges() {
        let membership = Membership::unlinked(MembershipRole::Visitor);
        let mut table = RelationshipTable::default();
        table.link(&membership);
        assert_eq!(table.edge_count(), 0);
    }

    #[test]
    fn moving_a_user_reference() {
        let family = EntityId::new();
        let (old_user, new_user) = (EntityId::new(), EntityId::new());
        let mut membership = Membership::new(family, old_user, MembershipRole::Kid);

        let mut table = RelationshipTable::default();
        table.link(&membership);

        table.unlink(&membership);
        membership.user_id = Some(new_user);
        table.link(&membership);

        assert!(table.user_memberships(old_user).is_empty());
        assert_eq!(table.user_memberships(new_user), vec![membership.id]);
        assert_eq!(table.family_memberships(family), vec![membership.id]);
    }
}
