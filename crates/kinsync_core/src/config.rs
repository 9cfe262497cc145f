//! Entity store configuration.

/// What happens to memberships that still point at a user profile when
/// that profile is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserDeletionPolicy {
    /// Clear the membership's user reference and mark it dirty. The
    /// membership survives but is no longer `is_valid`.
    #[default]
    Orphan,
    /// Refuse the deletion while any active membership references the user.
    Forbid,
    /// Hard-delete the memberships together with the user.
    ///
    /// Opt-in only. Unlike the other policies this breaks the rule that
    /// deleting a user profile leaves its memberships in place.
    Cascade,
}

/// Configuration for an entity store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Prefix of the placeholder remote ids assigned by partial-migration
    /// recovery.
    pub recovery_id_prefix: String,

    /// Membership handling on user profile deletion.
    pub user_deletion_policy: UserDeletionPolicy,

    /// Largest batch accepted by the bulk create operations.
    pub max_batch_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            recovery_id_prefix: "migrated".to_string(),
            user_deletion_policy: UserDeletionPolicy::Orphan,
            max_batch_size: 1_000,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the recovery placeholder prefix.
    #[must_use]
    pub fn recovery_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.recovery_id_prefix = prefix.into();
        self
    }

    /// Sets the user deletion policy.
    #[must_use]
    pub const fn user_deletion_policy(mut self, policy: UserDeletionPolicy) -> Self {
        self.user_deletion_policy = policy;
        self
    }

    /// Sets the maximum bulk batch size.
    #[must_use]
    pub const fn max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size;
        self
    }
}
