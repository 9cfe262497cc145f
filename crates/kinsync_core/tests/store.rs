//! Entity store behaviour: lookups, validation, updates, transactions.

use kinsync_core::{
    CoreError, EntityId, EntityKind, EntityStore, Family, FamilyUpdate, Membership,
    MembershipRole, SyncStatus, UserProfile, UserProfileUpdate,
};

#[test]
fn fetch_by_code_finds_the_family() {
    let store = EntityStore::in_memory();
    let family = store
        .create_family(Family::new("Test Family", "TEST123", EntityId::new()))
        .unwrap();

    let fetched = store.fetch_family_by_code("TEST123").unwrap().unwrap();
    assert_eq!(fetched.id, family.id);
    assert_eq!(fetched.name, "Test Family");
}

#[test]
fn empty_lookup_keys_are_invalid_data() {
    let store = EntityStore::in_memory();

    match store.fetch_family_by_code("") {
        Err(CoreError::InvalidData { message }) => assert!(message.contains("cannot be empty")),
        other => panic!("expected InvalidData, got {other:?}"),
    }
    match store.fetch_user_profile_by_apple_user_id_hash("") {
        Err(CoreError::InvalidData { message }) => assert!(message.contains("cannot be empty")),
        other => panic!("expected InvalidData, got {other:?}"),
    }
}

#[test]
fn unknown_keys_and_ids_are_none() {
    let store = EntityStore::in_memory();
    assert!(store.fetch_family_by_code("MISSING").unwrap().is_none());
    assert!(store
        .fetch_user_profile_by_apple_user_id_hash("missing")
        .unwrap()
        .is_none());
    assert!(store.fetch_family(EntityId::new()).is_none());
    assert!(store.fetch_membership(EntityId::new()).is_none());
}

#[test]
fn blank_fields_are_rejected_with_the_field_name() {
    let store = EntityStore::in_memory();

    let err = store
        .create_family(Family::new("  ", "CODE1", EntityId::new()))
        .unwrap_err();
    assert!(err.to_string().contains("family name cannot be empty"));

    let err = store
        .create_user_profile(UserProfile::new("", "hash-1"))
        .unwrap_err();
    assert!(err.to_string().contains("display name cannot be empty"));

    assert_eq!(store.count(EntityKind::Family), 0);
    assert_eq!(store.count(EntityKind::UserProfile), 0);
    assert_eq!(store.stats().validation_failures, 2);
}

#[test]
fn duplicate_apple_user_id_hash_is_a_constraint_violation() {
    let store = EntityStore::in_memory();
    store
        .create_user_profile(UserProfile::new("Sam", "hash-sam"))
        .unwrap();
    let err = store
        .create_user_profile(UserProfile::new("Sam Again", "hash-sam"))
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::ConstraintViolation { kind: EntityKind::UserProfile, field: "apple_user_id_hash", .. }
    ));
}

#[test]
fn many_distinct_codes_all_resolve() {
    let store = EntityStore::in_memory();
    let creator = EntityId::new();
    let ids: Vec<_> = (0..50)
        .map(|i| {
            store
                .create_family(Family::new(format!("Family {i}"), format!("CODE{i:03}"), creator))
                .unwrap()
                .id
        })
        .collect();

    assert_eq!(store.count(EntityKind::Family), 50);
    for (i, id) in ids.iter().enumerate() {
        let found = store
            .fetch_family_by_code(&format!("CODE{i:03}"))
            .unwrap()
            .unwrap();
        assert_eq!(found.id, *id);
    }
}

#[test]
fn updates_mark_records_dirty_and_bump_revision() {
    let store = EntityStore::in_memory();
    let family = store
        .create_family(Family::new("Smiths", "SMITH1", EntityId::new()))
        .unwrap();
    let before = family.sync.revision;

    let updated = store
        .update_family(family.id, FamilyUpdate::new().name("Smythes").code("SMITH2"))
        .unwrap();

    assert_eq!(updated.name, "Smythes");
    assert!(updated.sync.needs_sync);
    assert_eq!(updated.sync.revision, before + 1);
    assert!(store.fetch_family_by_code("SMITH1").unwrap().is_none());
    assert_eq!(
        store.fetch_family_by_code("SMITH2").unwrap().map(|f| f.id),
        Some(family.id)
    );
    assert_eq!(store.stats().updates, 1);
}

#[test]
fn empty_update_changes_nothing() {
    let store = EntityStore::in_memory();
    let user = store
        .create_user_profile(UserProfile::new("Sam", "hash-sam"))
        .unwrap();
    let same = store
        .update_user_profile(user.id, UserProfileUpdate::new())
        .unwrap();
    assert_eq!(same, user);
    assert_eq!(store.stats().updates, 0);
}

#[test]
fn update_to_taken_code_is_rejected() {
    let store = EntityStore::in_memory();
    let creator = EntityId::new();
    store.create_family(Family::new("A", "A1", creator)).unwrap();
    let b = store.create_family(Family::new("B", "B1", creator)).unwrap();

    let err = store
        .update_family(b.id, FamilyUpdate::new().code("A1"))
        .unwrap_err();
    assert!(err.is_constraint_violation());
    assert_eq!(store.fetch_family(b.id).unwrap().code, "B1");
}

#[test]
fn avatar_can_be_set_and_cleared() {
    let store = EntityStore::in_memory();
    let user = store
        .create_user_profile(UserProfile::new("Sam", "hash-sam"))
        .unwrap();

    let with_avatar = store
        .update_user_profile(
            user.id,
            UserProfileUpdate::new().avatar_url(Some("https://img/sam.png".into())),
        )
        .unwrap();
    assert_eq!(with_avatar.avatar_url.as_deref(), Some("https://img/sam.png"));

    let cleared = store
        .update_user_profile(user.id, UserProfileUpdate::new().avatar_url(None))
        .unwrap();
    assert!(cleared.avatar_url.is_none());
}

#[test]
fn updating_missing_record_is_not_found() {
    let store = EntityStore::in_memory();
    let err = store
        .update_family(EntityId::new(), FamilyUpdate::new().name("X"))
        .unwrap_err();
    assert!(matches!(err, CoreError::EntityNotFound { .. }));
    assert!(store
        .set_membership_role(EntityId::new(), MembershipRole::Adult)
        .is_err());
}

#[test]
fn new_records_start_unsynced() {
    let store = EntityStore::in_memory();
    let user = store
        .create_user_profile(UserProfile::new("Sam", "hash-sam"))
        .unwrap();
    assert!(user.sync.needs_sync);
    assert_eq!(user.sync.status(), SyncStatus::Unsynced);
    assert_eq!(store.pending_sync(EntityKind::UserProfile).len(), 1);
}

#[test]
fn transaction_groups_writes_atomically() {
    let store = EntityStore::in_memory();

    let family_id = store
        .write_transaction(|txn| {
            let user = txn.create_user_profile(UserProfile::new("Sam", "hash-sam"))?;
            let family = txn.create_family(Family::new("Test Family", "TEST123", user.id))?;
            txn.create_membership(Membership::new(family.id, user.id, MembershipRole::ParentAdmin))?;
            assert_eq!(txn.family_memberships(family.id).len(), 1);
            Ok(family.id)
        })
        .unwrap();

    assert!(store.has_parent_admin(family_id));
    assert_eq!(store.stats().transactions_committed, 1);

    let result = store.write_transaction(|txn| {
        let user = txn.create_user_profile(UserProfile::new("Robin", "hash-robin"))?;
        txn.create_family(Family::new("Clash", "TEST123", user.id))?;
        Ok(())
    });
    assert!(result.unwrap_err().is_constraint_violation());
    assert!(store
        .fetch_user_profile_by_apple_user_id_hash("hash-robin")
        .unwrap()
        .is_none());
    assert_eq!(store.count(EntityKind::UserProfile), 1);
}
