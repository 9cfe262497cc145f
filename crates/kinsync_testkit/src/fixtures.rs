//! Test fixtures and store helpers.
//!
//! Provides convenience functions for setting up test stores
//! and common household scenarios.

use chrono::Duration;
use kinsync_core::{
    EntityStore, Family, Membership, MembershipRole, StoreConfig, UserProfile,
};
use kinsync_storage::FileBackend;
use std::path::PathBuf;
use tempfile::TempDir;

/// A test store with automatic cleanup.
pub struct TestStore {
    /// The store instance.
    pub store: EntityStore,
    config: StoreConfig,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Creates a new in-memory test store.
    pub fn memory() -> Self {
        Self::memory_with_config(StoreConfig::default())
    }

    /// Creates a new in-memory test store with `config`.
    pub fn memory_with_config(config: StoreConfig) -> Self {
        Self {
            store: EntityStore::with_config(config.clone()),
            config,
            temp_dir: None,
        }
    }

    /// Creates a new file-backed test store.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = StoreConfig::default();
        let store = open_file_store(&temp_dir.path().join(DB_FILE), config.clone());
        Self {
            store,
            config,
            temp_dir: Some(temp_dir),
        }
    }

    /// Returns the store file if file-backed, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self.temp_dir.as_ref().map(|d| d.path().join(DB_FILE))
    }

    /// Closes and reopens a file-backed store, reloading every record from
    /// disk. In-memory stores are returned unchanged.
    pub fn reopen(self) -> Self {
        let Some(path) = self.path() else {
            return self;
        };
        let Self {
            store,
            config,
            temp_dir,
        } = self;
        drop(store);
        Self {
            store: open_file_store(&path, config.clone()),
            config,
            temp_dir,
        }
    }
}

const DB_FILE: &str = "kinsync.db";

fn open_file_store(path: &std::path::Path, config: StoreConfig) -> EntityStore {
    let backend = FileBackend::open(path).expect("Failed to open file backend");
    EntityStore::open(Box::new(backend), config).expect("Failed to open file store")
}

impl std::ops::Deref for TestStore {
    type Target = EntityStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs a test with a temporary in-memory store.
///
/// # Example
///
/// ```rust,ignore
/// use kinsync_testkit::with_temp_store;
///
/// #[test]
/// fn my_test() {
///     with_temp_store(|store| {
///         let household = Household::create(store);
///         assert!(store.has_parent_admin(household.family.id));
///     });
/// }
/// ```
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&EntityStore) -> R,
{
    let test_store = TestStore::memory();
    f(&test_store.store)
}

/// Runs a test with a temporary file-backed store.
pub fn with_file_store<F, R>(f: F) -> R
where
    F: FnOnce(&EntityStore, &std::path::Path) -> R,
{
    let test_store = TestStore::file();
    let path = test_store.path().expect("File store should have a path");
    f(&test_store.store, &path)
}

/// A family with a parent admin and a kid, the kid joining one second
/// after the parent.
#[derive(Debug, Clone)]
pub struct Household {
    /// The parent.
    pub parent: UserProfile,
    /// The kid.
    pub kid: UserProfile,
    /// The family, created by the parent.
    pub family: Family,
    /// The parent's parent-admin membership.
    pub parent_membership: Membership,
    /// The kid's membership.
    pub kid_membership: Membership,
}

impl Household {
    /// Creates the household with family code `TEST123`.
    pub fn create(store: &EntityStore) -> Self {
        Self::create_with_code(store, "TEST123")
    }

    /// Creates the household under `code`. User hashes are derived from the
    /// code so several households can share a store.
    pub fn create_with_code(store: &EntityStore, code: &str) -> Self {
        let parent = store
            .create_user_profile(UserProfile::new("Parent", format!("hash-parent-{code}")))
            .expect("Failed to create parent");
        let kid = store
            .create_user_profile(UserProfile::new("Kid", format!("hash-kid-{code}")))
            .expect("Failed to create kid");
        let family = store
            .create_family(Family::new("Test Family", code, parent.id))
            .expect("Failed to create family");

        let parent_membership = store
            .create_membership(Membership::new(family.id, parent.id, MembershipRole::ParentAdmin))
            .expect("Failed to create parent membership");
        let mut kid_membership = Membership::new(family.id, kid.id, MembershipRole::Kid);
        kid_membership.joined_at = parent_membership.joined_at + Duration::seconds(1);
        let kid_membership = store
            .create_membership(kid_membership)
            .expect("Failed to create kid membership");

        Self {
            parent,
            kid,
            family,
            parent_membership,
            kid_membership,
        }
    }
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use chrono::Utc;
    use kinsync_core::{EntityKind, RemoteId};

    /// Creates a store with `family_count` families of `members_per_family`
    /// adult members each. Every member is a distinct user.
    pub fn populated_store(family_count: usize, members_per_family: usize) -> TestStore {
        let test_store = TestStore::memory();
        let owner = test_store
            .create_user_profile(UserProfile::new("Owner", "hash-owner"))
            .expect("Failed to create owner");

        for f in 0..family_count {
            let family = test_store
                .create_family(Family::new(format!("Family {f}"), format!("CODE{f:05}"), owner.id))
                .expect("Failed to create family");
            for m in 0..members_per_family {
                let user = test_store
                    .create_user_profile(UserProfile::new(
                        format!("Member {f}-{m}"),
                        format!("hash-{f}-{m}"),
                    ))
                    .expect("Failed to create member");
                test_store
                    .create_membership(Membership::new(family.id, user.id, MembershipRole::Adult))
                    .expect("Failed to create membership");
            }
        }

        test_store
    }

    /// Creates a store holding two dirty families as an interrupted
    /// migration leaves them: `complete` has both remote fields set, `bare`
    /// has neither.
    pub fn half_migrated_store() -> (TestStore, Family, Family) {
        let test_store = TestStore::memory();
        let owner = test_store
            .create_user_profile(UserProfile::new("Owner", "hash-owner"))
            .expect("Failed to create owner");
        let complete = test_store
            .create_family(Family::new("Complete", "COMPLETE", owner.id))
            .expect("Failed to create family");
        let bare = test_store
            .create_family(Family::new("Bare", "BARE", owner.id))
            .expect("Failed to create family");

        let mut imported = complete.sync.clone();
        imported.remote_id = Some(RemoteId::new("ck-family-complete"));
        imported.last_sync_date = Some(Utc::now());
        test_store
            .import_sync_metadata(EntityKind::Family, complete.id, imported)
            .expect("Failed to import metadata");

        let complete = test_store.fetch_family(complete.id).expect("family exists");
        let bare = test_store.fetch_family(bare.id).expect("family exists");
        (test_store, complete, bare)
    }
}
