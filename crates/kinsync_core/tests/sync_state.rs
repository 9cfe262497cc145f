//! Sync-state tracking: dirty flags, confirmed pushes, remote applies and
//! partial-migration recovery.

use chrono::{Duration, Utc};
use kinsync_core::{
    EntityId, EntityKind, EntityStore, Family, FamilyUpdate, Record, RemoteId, StoreConfig,
    SyncMetadata, SyncStatus, UserProfile,
};

fn synced_metadata(remote: &str) -> SyncMetadata {
    let now = Utc::now();
    SyncMetadata {
        needs_sync: false,
        remote_id: Some(RemoteId::new(remote)),
        last_sync_date: Some(now),
        modified_at: now,
        revision: 0,
    }
}

#[test]
fn mark_synced_clears_the_flag() {
    let store = EntityStore::in_memory();
    let family = store
        .create_family(Family::new("Smiths", "SMITH1", EntityId::new()))
        .unwrap();

    let clean = store
        .mark_synced(
            EntityKind::Family,
            family.id,
            RemoteId::new("ck-1"),
            Utc::now(),
            family.sync.revision,
        )
        .unwrap();

    assert!(clean);
    let meta = store.sync_metadata(EntityKind::Family, family.id).unwrap();
    assert_eq!(meta.status(), SyncStatus::Synced);
    assert!(store.pending_sync(EntityKind::Family).is_empty());
}

#[test]
fn write_during_push_keeps_the_record_dirty() {
    let store = EntityStore::in_memory();
    let family = store
        .create_family(Family::new("Smiths", "SMITH1", EntityId::new()))
        .unwrap();
    let pushed_revision = family.sync.revision;

    store
        .update_family(family.id, FamilyUpdate::new().name("Smythes"))
        .unwrap();

    let clean = store
        .mark_synced(
            EntityKind::Family,
            family.id,
            RemoteId::new("ck-1"),
            Utc::now(),
            pushed_revision,
        )
        .unwrap();

    assert!(!clean);
    let meta = store.sync_metadata(EntityKind::Family, family.id).unwrap();
    assert!(meta.needs_sync);
    assert_eq!(meta.remote_id, Some(RemoteId::new("ck-1")));
    assert_eq!(meta.status(), SyncStatus::PendingPush);
}

#[test]
fn local_write_after_sync_re_dirties() {
    let store = EntityStore::in_memory();
    let user = store
        .create_user_profile(UserProfile::new("Sam", "hash-sam"))
        .unwrap();
    store
        .mark_synced(EntityKind::UserProfile, user.id, RemoteId::new("ck-u"), Utc::now(), 0)
        .unwrap();
    let synced_at = store
        .sync_metadata(EntityKind::UserProfile, user.id)
        .unwrap()
        .last_sync_date;

    store
        .update_user_profile(
            user.id,
            kinsync_core::UserProfileUpdate::new().display_name("Samantha"),
        )
        .unwrap();

    let meta = store.sync_metadata(EntityKind::UserProfile, user.id).unwrap();
    assert!(meta.needs_sync);
    assert_eq!(meta.last_sync_date, synced_at);
}

#[test]
fn recovery_fills_missing_fields_and_requeues() {
    let store = EntityStore::in_memory();
    let creator = EntityId::new();
    let no_remote = store.create_family(Family::new("A", "A1", creator)).unwrap();
    let no_date = store.create_family(Family::new("B", "B1", creator)).unwrap();
    let complete = store.create_family(Family::new("C", "C1", creator)).unwrap();

    let mut partial = synced_metadata("ck-b");
    partial.last_sync_date = None;
    store
        .import_sync_metadata(EntityKind::Family, no_date.id, partial)
        .unwrap();
    store
        .import_sync_metadata(EntityKind::Family, complete.id, synced_metadata("ck-c"))
        .unwrap();

    let report = store.recover_partial_migrations(EntityKind::Family).unwrap();

    assert_eq!(report.inspected, 3);
    assert_eq!(report.recovered_count(), 2);
    assert!(!report.recovered.contains(&complete.id));

    let a = store.sync_metadata(EntityKind::Family, no_remote.id).unwrap();
    assert!(a.needs_sync);
    assert!(a
        .remote_id
        .as_ref()
        .unwrap()
        .as_str()
        .starts_with("migrated-family-"));
    assert!(a.last_sync_date.is_some());
    assert_ne!(a.status(), SyncStatus::Synced);

    let b = store.sync_metadata(EntityKind::Family, no_date.id).unwrap();
    assert_eq!(b.remote_id, Some(RemoteId::new("ck-b")));
    assert!(b.last_sync_date.is_some());
    assert!(b.needs_sync);

    let c = store.sync_metadata(EntityKind::Family, complete.id).unwrap();
    assert_eq!(c.status(), SyncStatus::Synced);
    assert_eq!(store.stats().records_recovered, 2);
}

#[test]
fn recovery_uses_configured_prefix() {
    let store = EntityStore::with_config(StoreConfig::new().recovery_id_prefix("legacy"));
    let user = store
        .create_user_profile(UserProfile::new("Sam", "hash-sam"))
        .unwrap();

    store.recover_all_partial_migrations().unwrap();

    let meta = store.sync_metadata(EntityKind::UserProfile, user.id).unwrap();
    assert!(meta
        .remote_id
        .unwrap()
        .as_str()
        .starts_with("legacy-user_profile-"));
}

#[test]
fn recovery_of_clean_store_is_a_no_op() {
    let store = EntityStore::in_memory();
    let report = store.recover_partial_migrations(EntityKind::Membership).unwrap();
    assert!(report.is_clean());
    assert_eq!(report.inspected, 0);
}

#[test]
fn apply_remote_replaces_content_and_cleans() {
    let store = EntityStore::in_memory();
    let family = store
        .create_family(Family::new("Smiths", "SMITH1", EntityId::new()))
        .unwrap();

    let mut remote = family.clone();
    remote.name = "Smiths (remote)".into();
    remote.sync.modified_at = family.sync.modified_at + Duration::seconds(5);

    let applied = store
        .apply_remote(
            Record::from(remote.clone()),
            RemoteId::new("ck-f"),
            Utc::now(),
            Some(family.sync.revision),
        )
        .unwrap();
    assert!(applied);

    let local = store.fetch_family(family.id).unwrap();
    assert_eq!(local.name, "Smiths (remote)");
    assert_eq!(local.sync.modified_at, remote.sync.modified_at);
    assert_eq!(local.sync.status(), SyncStatus::Synced);
}

#[test]
fn apply_remote_skips_when_local_write_raced() {
    let store = EntityStore::in_memory();
    let family = store
        .create_family(Family::new("Smiths", "SMITH1", EntityId::new()))
        .unwrap();
    store
        .update_family(family.id, FamilyUpdate::new().name("Local edit"))
        .unwrap();

    let applied = store
        .apply_remote(
            Record::from(family.clone()),
            RemoteId::new("ck-f"),
            Utc::now(),
            Some(family.sync.revision),
        )
        .unwrap();

    assert!(!applied);
    assert_eq!(store.fetch_family(family.id).unwrap().name, "Local edit");
}

#[test]
fn apply_remote_inserts_unknown_records() {
    let store = EntityStore::in_memory();
    let remote = UserProfile::new("Remote", "hash-remote");

    store
        .apply_remote(Record::from(remote.clone()), RemoteId::new("ck-r"), Utc::now(), None)
        .unwrap();

    let local = store
        .fetch_user_profile_by_apple_user_id_hash("hash-remote")
        .unwrap()
        .unwrap();
    assert_eq!(local.id, remote.id);
    assert!(!local.sync.needs_sync);
    assert!(store.pending_sync(EntityKind::UserProfile).is_empty());
}
