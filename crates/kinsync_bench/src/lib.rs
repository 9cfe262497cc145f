//! Benchmark workloads.

use kinsync_core::{EntityId, EntityStore, Family, Membership, MembershipRole, UserProfile};
use rand::seq::SliceRandom;
use rand::Rng;

const ROLES: [MembershipRole; 3] = [MembershipRole::ParentAdmin, MembershipRole::Adult, MembershipRole::Kid];

/// Generate a random alphanumeric string of `len` characters.
pub fn random_text(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Generate random value bytes of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Fills `store` with `families` families of `members` members each, every
/// member a distinct user with a random role. Returns the family ids.
pub fn populate(store: &EntityStore, families: usize, members: usize) -> Vec<EntityId> {
    let mut rng = rand::thread_rng();
    let owner = store
        .create_user_profile(UserProfile::new("Owner", format!("hash-{}", random_text(16))))
        .expect("create owner");

    (0..families)
        .map(|f| {
            let family = store
                .create_family(Family::new(random_text(12), format!("BENCH{f:06}"), owner.id))
                .expect("create family");
            for _ in 0..members {
                let user = store
                    .create_user_profile(UserProfile::new(random_text(10), random_text(32)))
                    .expect("create user");
                let role = *ROLES.choose(&mut rng).unwrap_or(&MembershipRole::Adult);
                store
                    .create_membership(Membership::new(family.id, user.id, role))
                    .expect("create membership");
            }
            family.id
        })
        .collect()
}
