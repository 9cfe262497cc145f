//! Sync engine state, statistics and per-cycle reports.

use crate::error::SyncError;
use kinsync_core::{EntityId, EntityKind, RemoteId};
use kinsync_sync_protocol::Conflict;
use std::time::{Duration, Instant};

/// The current state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Engine is idle, not syncing.
    Idle,
    /// Engine is pushing dirty records.
    Pushing,
    /// Engine is waiting before retrying.
    RetryWait,
    /// The last cycle finished without failures. Records beyond the push
    /// batch size may still be dirty; see [`SyncReport::pending_remaining`].
    Synced,
    /// The last cycle failed or left records it could not sync.
    Error,
}

impl SyncState {
    /// Returns true if a cycle is running.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncState::Pushing | SyncState::RetryWait)
    }

    /// Returns true if the engine can start a new cycle.
    pub fn can_start_sync(&self) -> bool {
        matches!(self, SyncState::Idle | SyncState::Synced | SyncState::Error)
    }
}

/// Statistics about sync operations.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Total number of sync cycles completed.
    pub cycles_completed: u64,
    /// Records accepted by the remote.
    pub records_pushed: u64,
    /// Remote versions applied locally.
    pub records_pulled: u64,
    /// Conflicts encountered.
    pub conflicts_detected: u64,
    /// Conflicts settled automatically.
    pub conflicts_resolved: u64,
    /// Records whose sync failed.
    pub failures: u64,
    /// Total number of retries.
    pub retries: u64,
    /// Remote calls that timed out.
    pub timeouts: u64,
    /// Remote calls interrupted by cancellation.
    pub cancellations: u64,
    /// Last sync time.
    pub last_sync_time: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// What happened to one record.
#[derive(Debug, Clone)]
pub enum RecordOutcome {
    /// The remote accepted the local version.
    ///
    /// `clean` is false when a local write landed while the push was in
    /// flight; the record then stays dirty for the next cycle.
    Pushed {
        /// Identifier the remote stores the record under.
        remote_id: RemoteId,
        /// Whether the record is now clean.
        clean: bool,
    },
    /// A remote version was applied to a record with no local changes.
    Pulled {
        /// False if a local write raced the pull.
        applied: bool,
    },
    /// A conflict was detected and settled by the conflict policy.
    Resolved {
        /// The settled conflict.
        conflict: Conflict,
        /// Whether the record is now clean.
        clean: bool,
    },
    /// A conflict the policy left to the application. The record stays
    /// dirty.
    Unresolved(Conflict),
}

/// A record whose sync failed.
#[derive(Debug, Clone)]
pub struct RecordFailure {
    /// Record kind.
    pub kind: EntityKind,
    /// Record id.
    pub id: EntityId,
    /// The error, rendered.
    pub error: String,
    /// Whether retrying may help.
    pub retryable: bool,
}

impl RecordFailure {
    pub(crate) fn new(kind: EntityKind, id: EntityId, error: &SyncError) -> Self {
        Self {
            kind,
            id,
            error: error.to_string(),
            retryable: error.is_retryable(),
        }
    }
}

/// Result of a sync cycle.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Records pushed and now clean.
    pub pushed: u64,
    /// Records pushed but dirtied again while the push was in flight.
    pub raced: u64,
    /// Remote versions applied.
    pub pulled: u64,
    /// Conflicts settled by the policy.
    pub resolved: Vec<Conflict>,
    /// Conflicts left for the application.
    pub unresolved: Vec<Conflict>,
    /// Records that could not be synced, from the last attempt.
    pub failures: Vec<RecordFailure>,
    /// Records of the cycle's kinds still dirty once it ended.
    pub pending_remaining: usize,
    /// Duration of the cycle, retries included.
    pub duration: Duration,
}

impl SyncReport {
    /// True when no record failed and no conflict is waiting.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.unresolved.is_empty()
    }

    /// True if any failure may go away on retry.
    pub fn has_retryable_failures(&self) -> bool {
        self.failures.iter().any(|f| f.retryable)
    }

    pub(crate) fn record(&mut self, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::Pushed { clean: true, .. } => self.pushed += 1,
            RecordOutcome::Pushed { clean: false, .. } => self.raced += 1,
            RecordOutcome::Pulled { applied } => self.pulled += u64::from(applied),
            RecordOutcome::Resolved { conflict, .. } => self.resolved.push(conflict),
            RecordOutcome::Unresolved(conflict) => self.unresolved.push(conflict),
        }
    }

    /// Folds a retry attempt into this report. Failures are replaced since
    /// the attempt retried every record still dirty.
    pub(crate) fn absorb(&mut self, attempt: SyncReport) {
        self.pushed += attempt.pushed;
        self.raced += attempt.raced;
        self.pulled += attempt.pulled;
        self.resolved.extend(attempt.resolved);
        self.unresolved = attempt.unresolved;
        self.failures = attempt.failures;
        self.pending_remaining = attempt.pending_remaining;
    }
}
