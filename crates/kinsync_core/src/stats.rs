//! Store statistics.
//!
//! Provides counters for monitoring store activity.
//!
//! # Usage
//!
//! ```rust,ignore
//! let store = EntityStore::in_memory();
//! store.create_family(Family::new("Smiths", "SMITH1", creator))?;
//!
//! let stats = store.stats();
//! println!("Creates: {}", stats.creates);
//! println!("Transactions: {}", stats.transactions_committed);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Store statistics.
///
/// All counters are atomic and can be read while operations are in progress.
/// Values are monotonically increasing.
#[derive(Debug, Default)]
pub struct StoreStats {
    // Write counters
    creates: AtomicU64,
    updates: AtomicU64,
    deletes: AtomicU64,
    /// Memberships removed because their family was deleted.
    cascade_deletes: AtomicU64,

    // Read counters
    lookups: AtomicU64,

    // Rejections
    constraint_violations: AtomicU64,
    validation_failures: AtomicU64,

    // Transaction counters
    transactions_committed: AtomicU64,
    transactions_aborted: AtomicU64,

    // Sync bookkeeping
    records_marked_synced: AtomicU64,
    records_recovered: AtomicU64,
    remote_applies: AtomicU64,
}

impl StoreStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    // === Increment methods (internal use) ===

    pub(crate) fn record_create(&self) {
        self.creates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_update(&self) {
        self.updates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cascade_delete(&self, count: u64) {
        self.cascade_deletes.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_lookup(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_constraint_violation(&self) {
        self.constraint_violations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_validation_failure(&self) {
        self.validation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_commit(&self) {
        self.transactions_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_abort(&self) {
        self.transactions_aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_marked_synced(&self) {
        self.records_marked_synced.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_recovered(&self, count: u64) {
        self.records_recovered.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_remote_apply(&self) {
        self.remote_applies.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a snapshot of all stats.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            creates: self.creates.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            cascade_deletes: self.cascade_deletes.load(Ordering::Relaxed),
            lookups: self.lookups.load(Ordering::Relaxed),
            constraint_violations: self.constraint_violations.load(Ordering::Relaxed),
            validation_failures: self.validation_failures.load(Ordering::Relaxed),
            transactions_committed: self.transactions_committed.load(Ordering::Relaxed),
            transactions_aborted: self.transactions_aborted.load(Ordering::Relaxed),
            records_marked_synced: self.records_marked_synced.load(Ordering::Relaxed),
            records_recovered: self.records_recovered.load(Ordering::Relaxed),
            remote_applies: self.remote_applies.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of store statistics.
///
/// Unlike `StoreStats`, this is a plain struct that can be compared or
/// passed across threads without atomics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Records created.
    pub creates: u64,
    /// Records updated locally.
    pub updates: u64,
    /// Records deleted, cascades included.
    pub deletes: u64,
    /// Memberships deleted by a family cascade.
    pub cascade_deletes: u64,
    /// Key and id lookups.
    pub lookups: u64,
    /// Unique-key collisions rejected.
    pub constraint_violations: u64,
    /// Writes rejected by validation.
    pub validation_failures: u64,
    /// Write transactions committed.
    pub transactions_committed: u64,
    /// Write transactions rolled back.
    pub transactions_aborted: u64,
    /// Records cleaned by a confirmed remote sync.
    pub records_marked_synced: u64,
    /// Records re-queued by partial-migration recovery.
    pub records_recovered: u64,
    /// Remote versions applied locally.
    pub remote_applies: u64,
}
