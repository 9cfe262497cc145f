//! Record lifecycle operations: create, update, delete.

use super::WriteTransaction;
use crate::config::UserDeletionPolicy;
use crate::entity::EntityId;
use crate::error::{CoreError, CoreResult};
use crate::model::{Family, Membership, MembershipRole, MembershipStatus, Record, UserProfile};
use crate::store::{FamilyUpdate, UserProfileUpdate};
use crate::sync_state::DeletionReport;
use crate::types::EntityKind;
use crate::validation;
use tracing::debug;

impl WriteTransaction<'_> {
    // === Create ===

    /// Inserts a new family.
    ///
    /// # Errors
    ///
    /// - `InvalidData` if the name or code is blank, or the id is taken
    /// - `ConstraintViolation` if another family already uses the code
    pub fn create_family(&mut self, mut family: Family) -> CoreResult<Family> {
        validation::validate_family(&family).map_err(|e| self.reject(e))?;
        self.ensure_new(EntityKind::Family, family.id)?;
        family.sync.needs_sync = true;

        let record = Record::from(family.clone());
        self.inner.state.check_unique(&record).map_err(|e| self.reject(e))?;
        self.stage_put(record)?;

        self.stats.record_create();
        debug!(family_id = %family.id, code = %family.code, "family created");
        Ok(family)
    }

    /// Inserts a new user profile.
    ///
    /// # Errors
    ///
    /// - `InvalidData` if the display name or credential hash is blank, or
    ///   the id is taken
    /// - `ConstraintViolation` if another profile already uses the hash
    pub fn create_user_profile(&mut self, mut user: UserProfile) -> CoreResult<UserProfile> {
        validation::validate_user_profile(&user).map_err(|e| self.reject(e))?;
        self.ensure_new(EntityKind::UserProfile, user.id)?;
        user.sync.needs_sync = true;

        let record = Record::from(user.clone());
        self.inner.state.check_unique(&record).map_err(|e| self.reject(e))?;
        self.stage_put(record)?;

        self.stats.record_create();
        debug!(user_id = %user.id, "user profile created");
        Ok(user)
    }

    /// Inserts a new membership.
    ///
    /// Either reference may be absent; a reference that is present must
    /// point at an existing record.
    ///
    /// # Errors
    ///
    /// `InvalidData` if a reference does not resolve or the id is taken.
    pub fn create_membership(&mut self, mut membership: Membership) -> CoreResult<Membership> {
        self.ensure_new(EntityKind::Membership, membership.id)?;
        self.ensure_references(membership.family_id, membership.user_id)?;
        membership.sync.needs_sync = true;

        self.stage_put(Record::from(membership.clone()))?;

        self.stats.record_create();
        debug!(
            membership_id = %membership.id,
            role = %membership.role,
            valid = membership.is_valid(),
            "membership created"
        );
        Ok(membership)
    }

    // === Update ===

    /// Applies `update` to a family and marks it dirty.
    ///
    /// An empty update returns the family unchanged.
    ///
    /// # Errors
    ///
    /// `EntityNotFound`, `InvalidData` or `ConstraintViolation`.
    pub fn update_family(&mut self, id: EntityId, update: FamilyUpdate) -> CoreResult<Family> {
        let mut family = self
            .family(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(EntityKind::Family, id))?;
        if update.is_empty() {
            return Ok(family);
        }

        if let Some(name) = update.name {
            family.name = name;
        }
        if let Some(code) = update.code {
            family.code = code;
        }
        validation::validate_family(&family).map_err(|e| self.reject(e))?;
        let record = Record::from(family.clone());
        self.inner.state.check_unique(&record).map_err(|e| self.reject(e))?;

        family.sync.mark_dirty();
        self.stage_put(Record::from(family.clone()))?;
        self.stats.record_update();
        debug!(family_id = %id, revision = family.sync.revision, "family updated");
        Ok(family)
    }

    /// Applies `update` to a user profile and marks it dirty.
    ///
    /// # Errors
    ///
    /// `EntityNotFound`, `InvalidData` or `ConstraintViolation`.
    pub fn update_user_profile(
        &mut self,
        id: EntityId,
        update: UserProfileUpdate,
    ) -> CoreResult<UserProfile> {
        let mut user = self
            .user_profile(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(EntityKind::UserProfile, id))?;
        if update.is_empty() {
            return Ok(user);
        }

        if let Some(name) = update.display_name {
            user.display_name = name;
        }
        if let Some(hash) = update.apple_user_id_hash {
            user.apple_user_id_hash = hash;
        }
        if let Some(avatar) = update.avatar_url {
            user.avatar_url = avatar;
        }
        validation::validate_user_profile(&user).map_err(|e| self.reject(e))?;
        let record = Record::from(user.clone());
        self.inner.state.check_unique(&record).map_err(|e| self.reject(e))?;

        user.sync.mark_dirty();
        self.stage_put(Record::from(user.clone()))?;
        self.stats.record_update();
        debug!(user_id = %id, revision = user.sync.revision, "user profile updated");
        Ok(user)
    }

    /// Changes a membership's role.
    ///
    /// # Errors
    ///
    /// `EntityNotFound` if the membership does not exist.
    pub fn set_membership_role(&mut self, id: EntityId, role: MembershipRole) -> CoreResult<Membership> {
        self.modify_membership(id, |m| {
            let changed = m.role != role;
            m.role = role;
            changed
        })
    }

    /// Soft-removes a membership. The record is kept but leaves every
    /// active view.
    ///
    /// # Errors
    ///
    /// `EntityNotFound` if the membership does not exist.
    pub fn remove_membership(&mut self, id: EntityId) -> CoreResult<Membership> {
        self.modify_membership(id, |m| set_status(m, MembershipStatus::Removed))
    }

    /// Reactivates a soft-removed membership.
    ///
    /// # Errors
    ///
    /// `EntityNotFound` if the membership does not exist.
    pub fn restore_membership(&mut self, id: EntityId) -> CoreResult<Membership> {
        self.modify_membership(id, |m| set_status(m, MembershipStatus::Active))
    }

    /// Points a membership at another user (or at none). The membership
    /// leaves the old user's view and enters the new one in the same write.
    ///
    /// # Errors
    ///
    /// `EntityNotFound` for a missing membership, `InvalidData` for a
    /// missing user.
    pub fn reassign_membership_user(
        &mut self,
        id: EntityId,
        user_id: Option<EntityId>,
    ) -> CoreResult<Membership> {
        self.ensure_references(None, user_id)?;
        self.modify_membership(id, |m| {
            let changed = m.user_id != user_id;
            m.user_id = user_id;
            changed
        })
    }

    /// Points a membership at another family (or at none).
    ///
    /// # Errors
    ///
    /// `EntityNotFound` for a missing membership, `InvalidData` for a
    /// missing family.
    pub fn reassign_membership_family(
        &mut self,
        id: EntityId,
        family_id: Option<EntityId>,
    ) -> CoreResult<Membership> {
        self.ensure_references(family_id, None)?;
        self.modify_membership(id, |m| {
            let changed = m.family_id != family_id;
            m.family_id = family_id;
            changed
        })
    }

    // === Delete ===

    /// Deletes a family and hard-deletes every membership that references
    /// it. User profiles are never touched.
    ///
    /// # Errors
    ///
    /// `EntityNotFound` if the family does not exist.
    pub fn delete_family(&mut self, id: EntityId) -> CoreResult<DeletionReport> {
        if self.family(id).is_none() {
            return Err(CoreError::not_found(EntityKind::Family, id));
        }

        let mut report = DeletionReport::new(EntityKind::Family, id);
        let membership_ids: Vec<EntityId> = self
            .inner
            .state
            .family_memberships(id)
            .iter()
            .map(|m| m.id)
            .collect();

        for membership_id in membership_ids {
            if self.stage_delete(EntityKind::Membership, membership_id)?.is_some() {
                report.cascaded.push(membership_id);
                self.stats.record_delete();
            }
        }
        self.stage_delete(EntityKind::Family, id)?;
        self.stats.record_delete();
        self.stats.record_cascade_delete(report.cascaded.len() as u64);

        debug!(family_id = %id, cascaded = report.cascaded.len(), "family deleted");
        Ok(report)
    }

    /// Deletes a user profile. Memberships that still reference it are
    /// handled according to the configured [`UserDeletionPolicy`].
    ///
    /// # Errors
    ///
    /// - `EntityNotFound` if the profile does not exist
    /// - `InvalidData` under `Forbid` while active memberships remain
    pub fn delete_user_profile(&mut self, id: EntityId) -> CoreResult<DeletionReport> {
        if self.user_profile(id).is_none() {
            return Err(CoreError::not_found(EntityKind::UserProfile, id));
        }

        let memberships: Vec<Membership> = self
            .inner
            .state
            .user_memberships(id)
            .into_iter()
            .cloned()
            .collect();
        let policy = self.config.user_deletion_policy;

        if policy == UserDeletionPolicy::Forbid {
            let active = memberships.iter().filter(|m| m.is_active()).count();
            if active > 0 {
                return Err(self.reject(CoreError::invalid_data(format!(
                    "user profile {id} still has {active} active memberships"
                ))));
            }
        }

        let mut report = DeletionReport::new(EntityKind::UserProfile, id);
        for mut membership in memberships {
            if policy == UserDeletionPolicy::Cascade {
                self.stage_delete(EntityKind::Membership, membership.id)?;
                self.stats.record_delete();
                report.cascaded.push(membership.id);
            } else {
                membership.user_id = None;
                membership.sync.mark_dirty();
                report.orphaned.push(membership.id);
                self.stage_put(Record::from(membership))?;
                self.stats.record_update();
            }
        }
        self.stage_delete(EntityKind::UserProfile, id)?;
        self.stats.record_delete();

        debug!(
            user_id = %id,
            ?policy,
            cascaded = report.cascaded.len(),
            orphaned = report.orphaned.len(),
            "user profile deleted"
        );
        Ok(report)
    }

    /// Hard-deletes a membership.
    ///
    /// # Errors
    ///
    /// `EntityNotFound` if the membership does not exist.
    pub fn delete_membership(&mut self, id: EntityId) -> CoreResult<()> {
        if self.stage_delete(EntityKind::Membership, id)?.is_none() {
            return Err(CoreError::not_found(EntityKind::Membership, id));
        }
        self.stats.record_delete();
        debug!(membership_id = %id, "membership deleted");
        Ok(())
    }

    // === Helpers ===

    fn ensure_new(&self, kind: EntityKind, id: EntityId) -> CoreResult<()> {
        if self.inner.state.contains(kind, id) {
            return Err(self.reject(CoreError::invalid_data(format!("{kind} {id} already exists"))));
        }
        Ok(())
    }

    fn ensure_references(
        &self,
        family_id: Option<EntityId>,
        user_id: Option<EntityId>,
    ) -> CoreResult<()> {
        if let Some(family_id) = family_id {
            if self.family(family_id).is_none() {
                return Err(self.reject(CoreError::invalid_data(format!(
                    "membership references unknown family {family_id}"
                ))));
            }
        }
        if let Some(user_id) = user_id {
            if self.user_profile(user_id).is_none() {
                return Err(self.reject(CoreError::invalid_data(format!(
                    "membership references unknown user profile {user_id}"
                ))));
            }
        }
        Ok(())
    }

    /// Applies `edit` to a membership; when it reports a change the
    /// membership is marked dirty and staged.
    fn modify_membership(
        &mut self,
        id: EntityId,
        edit: impl FnOnce(&mut Membership) -> bool,
    ) -> CoreResult<Membership> {
        let mut membership = self
            .membership(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(EntityKind::Membership, id))?;
        if !edit(&mut membership) {
            return Ok(membership);
        }

        membership.sync.mark_dirty();
        self.stage_put(Record::from(membership.clone()))?;
        self.stats.record_update();
        debug!(
            membership_id = %id,
            status = ?membership.status,
            role = %membership.role,
            "membership updated"
        );
        Ok(membership)
    }
}

fn set_status(membership: &mut Membership, status: MembershipStatus) -> bool {
    let changed = membership.status != status;
    membership.status = status;
    changed
}
