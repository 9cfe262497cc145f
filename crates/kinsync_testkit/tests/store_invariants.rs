//! Relationship invariants under random sequences of store operations.

use kinsync_core::{EntityKind, EntityStore};
use kinsync_testkit::prelude::*;
use proptest::prelude::*;

fn assert_consistent(store: &EntityStore) -> Result<(), TestCaseError> {
    for membership in store.fetch_all_memberships() {
        prop_assert_eq!(membership.is_valid(), membership.family_id.is_some() && membership.user_id.is_some());

        if let Some(family_id) = membership.family_id {
            prop_assert!(store.fetch_family(family_id).is_some(), "membership points at a deleted family");
            prop_assert!(store
                .family_memberships(family_id)
                .iter()
                .any(|m| m.id == membership.id));
            prop_assert_eq!(
                store.active_members(family_id).iter().any(|v| v.membership.id == membership.id),
                membership.is_active()
            );
        }
        if let Some(user_id) = membership.user_id {
            prop_assert!(store.user_memberships(user_id).iter().any(|m| m.id == membership.id));
        }
    }

    for family in store.fetch_all_families() {
        for membership in store.family_memberships(family.id) {
            prop_assert_eq!(membership.family_id, Some(family.id));
        }
        let expected_admin = store
            .family_memberships(family.id)
            .into_iter()
            .any(|m| m.is_active() && m.is_parent_admin());
        prop_assert_eq!(store.has_parent_admin(family.id), expected_admin);
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn views_stay_bidirectional(
        plan in household_plan_strategy(4, 4),
        operations in store_operations_strategy(24),
    ) {
        init_tracing();
        let store = EntityStore::in_memory();
        let families = plan.build(&store);
        let users_before = store.count(EntityKind::UserProfile);

        for operation in &operations {
            operation.apply(&store, &families).unwrap();
            assert_consistent(&store)?;
        }

        prop_assert_eq!(store.count(EntityKind::UserProfile), users_before);
    }

    #[test]
    fn every_local_mutation_dirties_the_record(plan in household_plan_strategy(2, 3), name in name_strategy()) {
        let store = EntityStore::in_memory();
        let families = plan.build(&store);
        let family = families[0];

        let before = store.sync_metadata(EntityKind::Family, family).unwrap();
        store
            .update_family(family, kinsync_core::FamilyUpdate::new().name(name))
            .unwrap();
        let after = store.sync_metadata(EntityKind::Family, family).unwrap();

        prop_assert!(after.needs_sync);
        prop_assert!(after.revision > before.revision);
        prop_assert_eq!(after.last_sync_date, before.last_sync_date);
    }
}

#[test]
fn scenario_recovery_leaves_no_partial_record() {
    init_tracing();
    let (store, complete, bare) = scenarios::half_migrated_store();

    let report = store.recover_partial_migrations(EntityKind::Family).unwrap();
    assert_eq!(report.recovered, vec![bare.id]);

    let families = store.fetch_all_families();
    assert_eq!(families.len(), 2);
    for family in &families {
        assert!(family.sync.remote_id.is_some());
        assert!(family.sync.last_sync_date.is_some());
        assert!(family.sync.needs_sync);
    }
    assert_eq!(
        store.fetch_family(complete.id).unwrap().sync.remote_id,
        complete.sync.remote_id
    );
}
