//! Storage backend benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use kinsync_bench::random_data;
use kinsync_storage::{FileBackend, InMemoryBackend, RecordKey, StorageBackend};
use tempfile::TempDir;

const COLLECTION: &str = "families";

fn key(n: u64) -> RecordKey {
    let mut key = [0u8; 16];
    key[8..].copy_from_slice(&n.to_be_bytes());
    key
}

/// Benchmark staged inserts followed by a commit.
fn bench_inmemory_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("inmemory_commit");

    for batch in [1u64, 10, 100] {
        let values: Vec<_> = (0..batch).map(|_| random_data(256)).collect();
        group.throughput(Throughput::Elements(batch));
        group.bench_with_input(BenchmarkId::from_parameter(batch), &values, |b, values| {
            let mut backend = InMemoryBackend::new();
            let mut next = 0u64;
            b.iter(|| {
                for value in values {
                    next += 1;
                    backend.insert(COLLECTION, key(next), value.clone()).unwrap();
                }
                backend.commit().unwrap();
            });
        });
    }
    group.finish();
}

/// Benchmark point reads.
fn bench_inmemory_get(c: &mut Criterion) {
    let mut backend = InMemoryBackend::new();
    for n in 0..1_000 {
        backend.insert(COLLECTION, key(n), random_data(256)).unwrap();
    }
    backend.commit().unwrap();

    c.bench_function("inmemory_get", |b| {
        b.iter(|| black_box(backend.get(COLLECTION, &key(black_box(500))).unwrap()));
    });
}

/// Benchmark predicate queries over a collection.
fn bench_inmemory_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("inmemory_query");

    for count in [100u64, 1_000, 10_000] {
        let mut backend = InMemoryBackend::new();
        for n in 0..count {
            backend.insert(COLLECTION, key(n), random_data(64)).unwrap();
        }
        backend.commit().unwrap();

        group.throughput(Throughput::Elements(count));
        group.bench_with_input(BenchmarkId::from_parameter(count), &backend, |b, backend| {
            b.iter(|| {
                let hits = backend
                    .query(COLLECTION, &|_, value| value.first().is_some_and(|byte| *byte < 16))
                    .unwrap();
                black_box(hits);
            });
        });
    }
    group.finish();
}

/// Benchmark durable commits to a file.
fn bench_file_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_commit");
    group.sample_size(20);

    for count in [10u64, 1_000] {
        group.throughput(Throughput::Elements(count));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let dir = TempDir::new().unwrap();
            let mut backend = FileBackend::open(&dir.path().join("bench.db")).unwrap();
            for n in 0..count {
                backend.insert(COLLECTION, key(n), random_data(256)).unwrap();
            }
            backend.commit().unwrap();
            let value = random_data(256);

            b.iter(|| {
                backend.insert(COLLECTION, key(0), value.clone()).unwrap();
                backend.commit().unwrap();
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_inmemory_commit,
    bench_inmemory_get,
    bench_inmemory_query,
    bench_file_commit,
);

criterion_main!(benches);
