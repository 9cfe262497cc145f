//! Entity store benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use kinsync_bench::{populate, random_text};
use kinsync_core::{
    EntityKind, EntityStore, Family, FamilyUpdate, Membership, MembershipRole, SyncMetadata,
    UserProfile,
};

/// Benchmark creating a family with its admin membership.
fn bench_create_household(c: &mut Criterion) {
    let store = EntityStore::in_memory();
    let parent = store
        .create_user_profile(UserProfile::new("Parent", "hash-parent"))
        .unwrap();
    let mut n = 0u64;

    c.bench_function("create_household", |b| {
        b.iter(|| {
            n += 1;
            let family = store
                .create_family(Family::new("Bench Family", format!("H{n:010}"), parent.id))
                .unwrap();
            store
                .create_membership(Membership::new(family.id, parent.id, MembershipRole::ParentAdmin))
                .unwrap();
            black_box(family);
        });
    });
}

/// Benchmark unique-key lookups on populated stores.
fn bench_fetch_by_code(c: &mut Criterion) {
    let mut group = c.benchmark_group("fetch_family_by_code");

    for families in [100, 1_000, 10_000] {
        let store = EntityStore::in_memory();
        populate(&store, families, 0);
        let code = format!("BENCH{:06}", families / 2);

        group.bench_with_input(BenchmarkId::from_parameter(families), &code, |b, code| {
            b.iter(|| {
                let family = store.fetch_family_by_code(black_box(code)).unwrap();
                black_box(family);
            });
        });
    }
    group.finish();
}

/// Benchmark the active-member view of one family.
fn bench_active_members(c: &mut Criterion) {
    let mut group = c.benchmark_group("active_members");

    for members in [4, 32, 256] {
        let store = EntityStore::in_memory();
        let families = populate(&store, 10, members);

        group.throughput(Throughput::Elements(members as u64));
        group.bench_with_input(BenchmarkId::from_parameter(members), &families[0], |b, id| {
            b.iter(|| black_box(store.active_members(*id)));
        });
    }
    group.finish();
}

/// Benchmark deleting a family and cascading to its memberships.
fn bench_cascade_delete(c: &mut Criterion) {
    let mut group = c.benchmark_group("cascade_delete");

    for members in [1, 16, 128] {
        group.throughput(Throughput::Elements(members as u64));
        group.bench_with_input(BenchmarkId::from_parameter(members), &members, |b, &members| {
            b.iter_batched(
                || {
                    let store = EntityStore::in_memory();
                    let families = populate(&store, 1, members);
                    (store, families[0])
                },
                |(store, family)| {
                    let report = store.delete_family(family).unwrap();
                    black_box(report);
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

/// Benchmark re-queueing half-synced records.
fn bench_recovery(c: &mut Criterion) {
    let mut group = c.benchmark_group("recover_partial_migrations");

    for families in [100, 1_000] {
        group.throughput(Throughput::Elements(families as u64));
        group.bench_with_input(BenchmarkId::from_parameter(families), &families, |b, &families| {
            b.iter_batched(
                || {
                    let store = EntityStore::in_memory();
                    for id in populate(&store, families, 0).into_iter().step_by(2) {
                        let mut meta = store.sync_metadata(EntityKind::Family, id).unwrap();
                        meta.last_sync_date = Some(chrono::Utc::now());
                        store.import_sync_metadata(EntityKind::Family, id, meta).unwrap();
                    }
                    store
                },
                |store| black_box(store.recover_partial_migrations(EntityKind::Family).unwrap()),
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

/// Benchmark renames, each one dirtying the record.
fn bench_update(c: &mut Criterion) {
    let store = EntityStore::in_memory();
    let families = populate(&store, 100, 0);
    let name = random_text(12);

    c.bench_function("update_family_name", |b| {
        let mut i = 0usize;
        b.iter(|| {
            i += 1;
            let id = families[i % families.len()];
            let family = store
                .update_family(id, FamilyUpdate::new().name(black_box(name.as_str())))
                .unwrap();
            black_box::<SyncMetadata>(family.sync);
        });
    });
}

criterion_group!(
    benches,
    bench_create_household,
    bench_fetch_by_code,
    bench_active_members,
    bench_cascade_delete,
    bench_recovery,
    bench_update,
);

criterion_main!(benches);
