//! Stress runs for the entity store.
//!
//! These verify behavior under heavy load and concurrent readers racing a
//! writer.

use kinsync_core::{CoreError, EntityStore, Family, Membership, MembershipRole, UserProfile};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }
}

/// Configuration for stress runs.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of operations to perform.
    pub operations: usize,
    /// Number of concurrent reader threads.
    pub threads: usize,
    /// Number of families to spread writes over.
    pub family_count: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 10_000,
            threads: 4,
            family_count: 100,
        }
    }
}

fn owner(store: &EntityStore) -> UserProfile {
    store
        .create_user_profile(UserProfile::new("Stress Owner", "hash-stress-owner"))
        .expect("Failed to create owner")
}

/// Creates `operations` families with distinct codes, one write each.
pub fn stress_sequential_creates(store: &EntityStore, config: &StressConfig) -> StressTestResult {
    let owner = owner(store);

    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        match store.create_family(Family::new(format!("Family {i}"), format!("S{i:08}"), owner.id)) {
            Ok(_) => successful += 1,
            Err(_) => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// One writer adds memberships while reader threads check that every
/// family's membership view only holds memberships pointing back at it.
///
/// A read counts as failed when it observes an inconsistent view, a
/// write when the store rejects it.
pub fn stress_concurrent_reads(store: Arc<EntityStore>, config: &StressConfig) -> StressTestResult {
    let owner = owner(&store);
    let families: Vec<_> = (0..config.family_count.max(1))
        .map(|i| {
            store
                .create_family(Family::new(format!("Family {i}"), format!("R{i:08}"), owner.id))
                .expect("Failed to create family")
                .id
        })
        .collect();
    let families = Arc::new(families);

    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let ops_per_thread = config.operations / config.threads.max(1);

    let start = Instant::now();

    let writer = {
        let store = Arc::clone(&store);
        let families = Arc::clone(&families);
        let failed = Arc::clone(&failed);
        let writes = config.operations;
        thread::spawn(move || {
            for i in 0..writes {
                let family = families[i % families.len()];
                if store
                    .create_membership(Membership::new(family, owner.id, MembershipRole::Adult))
                    .is_err()
                {
                    failed.fetch_add(1, Ordering::Relaxed);
                }
            }
        })
    };

    let readers: Vec<_> = (0..config.threads)
        .map(|t| {
            let store = Arc::clone(&store);
            let families = Arc::clone(&families);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);

            thread::spawn(move || {
                for i in 0..ops_per_thread {
                    let family = families[(t * ops_per_thread + i) % families.len()];
                    let consistent = store
                        .family_memberships(family)
                        .iter()
                        .all(|m| m.family_id == Some(family));
                    let counter = if consistent { &successful } else { &failed };
                    counter.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();

    for handle in readers {
        handle.join().expect("Reader thread panicked");
    }
    writer.join().expect("Writer thread panicked");

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// Runs `operations` write transactions, every other one failing after
/// its writes were staged.
pub fn stress_transaction_aborts(store: &EntityStore, config: &StressConfig) -> StressTestResult {
    let owner = owner(store);

    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        let should_fail = i % 2 == 0;
        let result = store.write_transaction(|txn| {
            txn.create_family(Family::new(format!("Family {i}"), format!("A{i:08}"), owner.id))?;
            if should_fail {
                Err(CoreError::transaction_aborted("intentional"))
            } else {
                Ok(())
            }
        });

        match result {
            Ok(()) => successful += 1,
            Err(_) => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}
