//! The sync engine: pushes dirty records, settles conflicts, applies
//! remote versions.

use crate::cancel::CancelHandle;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::state::{RecordFailure, RecordOutcome, SyncReport, SyncState, SyncStats};
use crate::transport::SyncTransport;
use chrono::Utc;
use kinsync_core::{CoreError, EntityId, EntityKind, EntityStore, RemoteId};
use kinsync_sync_protocol::{
    ConflictResolution, ConflictResolver, PullRequest, PushRequest, RecordSnapshot,
};
use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Puts the engine back to idle if a cycle's future is dropped midway.
struct CycleGuard<'a> {
    state: &'a RwLock<SyncState>,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.write();
        if state.is_active() {
            *state = SyncState::Idle;
        }
    }
}

/// The sync engine keeps an [`EntityStore`] in step with a remote.
///
/// Local records are the source of truth until the remote confirms a
/// push. A remote call that fails, times out or is cancelled changes
/// nothing locally, so the record stays `needs_sync`. Store locks are
/// never held across a remote call.
pub struct SyncEngine<T: SyncTransport> {
    store: Arc<EntityStore>,
    transport: Arc<T>,
    config: SyncConfig,
    resolver: ConflictResolver,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
    cancel: CancelHandle,
}

impl<T: SyncTransport> SyncEngine<T> {
    /// Creates a new sync engine.
    pub fn new(store: Arc<EntityStore>, transport: Arc<T>, config: SyncConfig) -> Self {
        Self {
            resolver: ConflictResolver::new(config.conflict_policy),
            store,
            transport,
            config,
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
            cancel: CancelHandle::new(),
        }
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the local store.
    pub fn store(&self) -> &Arc<EntityStore> {
        &self.store
    }

    /// Returns the transport.
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Returns a handle that can cancel this engine from another task.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Cancels any ongoing sync operation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Resets the cancelled flag.
    ///
    /// Cycles reset it when they start; single-record operations do not.
    pub fn reset_cancel(&self) {
        self.cancel.reset();
    }

    fn set_state(&self, state: SyncState) {
        *self.state.write() = state;
    }

    /// Runs a remote call under the configured timeout, racing it against
    /// cancellation.
    async fn remote<R>(&self, call: impl Future<Output = SyncResult<R>>) -> SyncResult<R> {
        if self.cancel.is_cancelled() {
            self.stats.write().cancellations += 1;
            return Err(SyncError::Cancelled);
        }

        let result = tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(SyncError::Cancelled),
            outcome = tokio::time::timeout(self.config.timeout, call) => {
                outcome.unwrap_or_else(|_| Err(SyncError::Timeout))
            }
        };

        match &result {
            Err(SyncError::Timeout) => self.stats.write().timeouts += 1,
            Err(SyncError::Cancelled) => self.stats.write().cancellations += 1,
            _ => {}
        }
        result
    }

    /// Pushes the current local version of one record.
    ///
    /// On a conflict the remote version is pulled and the configured
    /// policy decides which side wins.
    ///
    /// # Errors
    ///
    /// Transport errors, `Timeout` and `Cancelled` leave the record
    /// untouched and dirty. `Store(EntityNotFound)` if the record does not
    /// exist locally.
    pub async fn push_record(&self, kind: EntityKind, id: EntityId) -> SyncResult<RecordOutcome> {
        let record = self
            .store
            .fetch_record(kind, id)
            .ok_or_else(|| CoreError::not_found(kind, id))?;
        let revision = record.sync().revision;
        let local = RecordSnapshot::from_record(&record)?;

        let request = PushRequest::new(self.config.device_id.clone(), local.clone());
        match self.remote(self.transport.push(&request)).await {
            Ok(response) => {
                let clean = self.store.mark_synced(
                    kind,
                    id,
                    response.remote_id.clone(),
                    response.accepted_at,
                    revision,
                )?;
                self.stats.write().records_pushed += 1;
                debug!(%kind, %id, remote_id = %response.remote_id, clean, "record pushed");
                Ok(RecordOutcome::Pushed {
                    remote_id: response.remote_id,
                    clean,
                })
            }
            Err(SyncError::Conflict { remote_id }) => {
                self.stats.write().conflicts_detected += 1;
                let pull = PullRequest::new(self.config.device_id.clone(), remote_id.clone());
                let remote = self.remote(self.transport.pull(&pull)).await?.snapshot;
                self.settle(local, revision, remote, remote_id).await
            }
            Err(e) => Err(e),
        }
    }

    /// Fetches the remote version stored under `remote_id` and applies it.
    ///
    /// A record with no local changes (or no local copy) takes the remote
    /// version as is. A dirty record goes through conflict resolution.
    ///
    /// # Errors
    ///
    /// `NotFound` if the remote has no such record, plus the errors of
    /// [`push_record`](Self::push_record).
    pub async fn pull_record(&self, remote_id: &RemoteId) -> SyncResult<RecordOutcome> {
        let request = PullRequest::new(self.config.device_id.clone(), remote_id.clone());
        let remote = self.remote(self.transport.pull(&request)).await?.snapshot;

        match self.store.fetch_record(remote.kind, remote.entity_id) {
            Some(record) if record.sync().needs_sync => {
                self.stats.write().conflicts_detected += 1;
                let revision = record.sync().revision;
                let local = RecordSnapshot::from_record(&record)?;
                self.settle(local, revision, remote, remote_id.clone()).await
            }
            local => {
                let expected = local.map(|r| r.sync().revision);
                let (kind, id) = (remote.kind, remote.entity_id);
                let applied =
                    self.store
                        .apply_remote(remote.to_record()?, remote_id.clone(), Utc::now(), expected)?;
                if applied {
                    self.stats.write().records_pulled += 1;
                }
                debug!(%kind, %id, applied, "remote version pulled");
                Ok(RecordOutcome::Pulled { applied })
            }
        }
    }

    /// Resolves a conflict between the local version taken at `revision`
    /// and the remote version, then carries out the resolution.
    async fn settle(
        &self,
        local: RecordSnapshot,
        revision: u64,
        remote: RecordSnapshot,
        remote_id: RemoteId,
    ) -> SyncResult<RecordOutcome> {
        let (kind, id) = (local.kind, local.entity_id);
        let conflict = self.resolver.resolve(local, remote)?;
        info!(
            %kind,
            %id,
            scenario = ?conflict.scenario,
            resolution = ?conflict.resolution,
            "conflict detected"
        );

        let clean = match conflict.resolution {
            Some(ConflictResolution::KeepLocal) => {
                let (remote_id, at) = if conflict.is_converged() {
                    (remote_id, Utc::now())
                } else {
                    let request = PushRequest::new(
                        self.config.device_id.clone(),
                        conflict.local.clone().with_remote_id(remote_id),
                    );
                    let response = self.remote(self.transport.push(&request)).await?;
                    self.stats.write().records_pushed += 1;
                    (response.remote_id, response.accepted_at)
                };
                self.store.mark_synced(kind, id, remote_id, at, revision)?
            }
            Some(ConflictResolution::AcceptRemote) => {
                let record = conflict.remote.to_record()?;
                let applied = self
                    .store
                    .apply_remote(record, remote_id, Utc::now(), Some(revision))?;
                if applied {
                    self.stats.write().records_pulled += 1;
                }
                applied
            }
            Some(ConflictResolution::Skip) | None => {
                warn!(%kind, %id, "conflict left for manual resolution");
                return Ok(RecordOutcome::Unresolved(conflict));
            }
        };

        self.stats.write().conflicts_resolved += 1;
        Ok(RecordOutcome::Resolved { conflict, clean })
    }

    /// Pushes up to `push_batch_size` dirty records of `kind`.
    async fn push_pending(&self, kind: EntityKind, report: &mut SyncReport) -> SyncResult<()> {
        let pending = self.store.pending_sync(kind);
        debug!(%kind, pending = pending.len(), "pushing dirty records");

        for id in pending
            .iter()
            .map(|r| r.id())
            .take(self.config.push_batch_size)
        {
            match self.push_record(kind, id).await {
                Ok(outcome) => report.record(outcome),
                Err(e) if e.aborts_cycle() => return Err(e),
                Err(e) => {
                    warn!(%kind, %id, error = %e, "record sync failed");
                    self.stats.write().failures += 1;
                    report.failures.push(RecordFailure::new(kind, id, &e));
                }
            }
        }
        Ok(())
    }

    /// One pass over `kinds`, in order.
    async fn run_cycle(&self, kinds: &[EntityKind]) -> SyncResult<SyncReport> {
        let mut report = SyncReport::default();
        for kind in kinds {
            self.push_pending(*kind, &mut report).await?;
        }
        report.pending_remaining = kinds.iter().map(|k| self.store.pending_sync(*k).len()).sum();
        Ok(report)
    }

    fn begin_cycle(&self) -> SyncResult<CycleGuard<'_>> {
        let mut state = self.state.write();
        if !state.can_start_sync() {
            return Err(SyncError::InvalidStateTransition {
                from: format!("{:?}", *state),
                to: format!("{:?}", SyncState::Pushing),
            });
        }
        *state = SyncState::Pushing;
        drop(state);

        self.cancel.reset();
        Ok(CycleGuard { state: &self.state })
    }

    fn finish_cycle(&self, start: Instant, result: SyncResult<SyncReport>) -> SyncResult<SyncReport> {
        match result {
            Ok(mut report) => {
                report.duration = start.elapsed();
                self.set_state(if report.failures.is_empty() {
                    SyncState::Synced
                } else {
                    SyncState::Error
                });

                let mut stats = self.stats.write();
                stats.cycles_completed += 1;
                stats.last_sync_time = Some(Instant::now());
                stats.last_error = report.failures.last().map(|f| f.error.clone());
                drop(stats);

                info!(
                    pushed = report.pushed,
                    pulled = report.pulled,
                    resolved = report.resolved.len(),
                    unresolved = report.unresolved.len(),
                    failed = report.failures.len(),
                    pending = report.pending_remaining,
                    duration_ms = report.duration.as_millis() as u64,
                    "sync cycle finished"
                );
                Ok(report)
            }
            Err(e) => {
                warn!(error = %e, "sync cycle aborted");
                self.set_state(SyncState::Error);
                self.stats.write().last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Performs a full sync cycle over every kind, referenced records
    /// first.
    ///
    /// Per-record failures are collected in the report; the cycle only
    /// fails as a whole when cancelled or when the remote rejects the
    /// device's credentials.
    ///
    /// # Errors
    ///
    /// `InvalidStateTransition` if a cycle is already running, `Cancelled`,
    /// `Auth`.
    pub async fn sync_all(&self) -> SyncResult<SyncReport> {
        self.sync_kinds(&EntityKind::ALL).await
    }

    /// Performs a sync cycle over one kind.
    ///
    /// # Errors
    ///
    /// As for [`sync_all`](Self::sync_all).
    pub async fn sync_kind(&self, kind: EntityKind) -> SyncResult<SyncReport> {
        self.sync_kinds(&[kind]).await
    }

    async fn sync_kinds(&self, kinds: &[EntityKind]) -> SyncResult<SyncReport> {
        let _guard = self.begin_cycle()?;
        let start = Instant::now();
        let result = self.run_cycle(kinds).await;
        self.finish_cycle(start, result)
    }

    /// Performs full cycles until no retryable failure is left or the
    /// retry budget is spent, backing off between attempts.
    ///
    /// # Errors
    ///
    /// As for [`sync_all`](Self::sync_all).
    pub async fn sync_with_retry(&self) -> SyncResult<SyncReport> {
        let _guard = self.begin_cycle()?;
        let start = Instant::now();
        let retry = &self.config.retry;
        let mut total = SyncReport::default();
        let mut attempt = 0u32;

        let result = loop {
            if attempt > 0 {
                self.set_state(SyncState::RetryWait);
                let delay = retry.delay_for_attempt(attempt);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying sync");

                let cancelled = tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => true,
                    () = tokio::time::sleep(delay) => false,
                };
                if cancelled {
                    self.stats.write().cancellations += 1;
                    break Err(SyncError::Cancelled);
                }

                self.stats.write().retries += 1;
                self.set_state(SyncState::Pushing);
            }
            attempt += 1;

            match self.run_cycle(&EntityKind::ALL).await {
                Ok(report) => {
                    let again = report.has_retryable_failures() && attempt < retry.max_attempts;
                    total.absorb(report);
                    if !again {
                        break Ok(total);
                    }
                }
                Err(e) => break Err(e),
            }
        };

        self.finish_cycle(start, result)
    }
}

impl<T: SyncTransport> std::fmt::Debug for SyncEngine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("device_id", &self.config.device_id)
            .field("state", &self.state())
            .field("policy", &self.resolver.policy())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::transport::{InjectedFailure, MockTransport};
    use kinsync_core::{Family, UserProfile};

    fn engine() -> SyncEngine<MockTransport> {
        let config = SyncConfig::new("device-a").with_retry(RetryConfig::no_retry());
        SyncEngine::new(
            Arc::new(EntityStore::in_memory()),
            Arc::new(MockTransport::new()),
            config,
        )
    }

    #[tokio::test]
    async fn initial_state() {
        let engine = engine();
        assert_eq!(engine.state(), SyncState::Idle);
        assert_eq!(engine.stats().cycles_completed, 0);
    }

    #[tokio::test]
    async fn empty_store_syncs_cleanly() {
        let engine = engine();
        let report = engine.sync_all().await.unwrap();
        assert!(report.is_clean());
        assert_eq!(report.pushed, 0);
        assert_eq!(engine.state(), SyncState::Synced);
        assert_eq!(engine.stats().cycles_completed, 1);
    }

    #[tokio::test]
    async fn push_clears_dirty_flag() {
        let engine = engine();
        let user = engine
            .store()
            .create_user_profile(UserProfile::new("Sam", "hash-sam"))
            .unwrap();

        let outcome = engine.push_record(EntityKind::UserProfile, user.id).await.unwrap();
        let RecordOutcome::Pushed { remote_id, clean } = outcome else {
            panic!("expected a push, got {outcome:?}");
        };
        assert!(clean);

        let meta = engine
            .store()
            .sync_metadata(EntityKind::UserProfile, user.id)
            .unwrap();
        assert!(!meta.needs_sync);
        assert_eq!(meta.remote_id, Some(remote_id));
        assert!(meta.last_sync_date.is_some());
    }

    #[tokio::test]
    async fn failed_push_keeps_record_dirty() {
        let engine = engine();
        let user = engine
            .store()
            .create_user_profile(UserProfile::new("Sam", "hash-sam"))
            .unwrap();
        engine.transport().fail_next(1, InjectedFailure::Network);

        let report = engine.sync_all().await.unwrap();
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].retryable);
        assert_eq!(engine.state(), SyncState::Error);
        assert!(engine.stats().last_error.is_some());

        let meta = engine
            .store()
            .sync_metadata(EntityKind::UserProfile, user.id)
            .unwrap();
        assert!(meta.needs_sync);
        assert!(meta.remote_id.is_none());
    }

    #[tokio::test]
    async fn auth_failure_aborts_cycle() {
        let engine = engine();
        let user = engine
            .store()
            .create_user_profile(UserProfile::new("Sam", "hash-sam"))
            .unwrap();
        engine
            .store()
            .create_family(Family::new("Test Family", "TEST123", user.id))
            .unwrap();
        engine.transport().fail_next(1, InjectedFailure::Auth);

        let err = engine.sync_all().await.unwrap_err();
        assert!(matches!(err, SyncError::Auth(_)));
        assert_eq!(engine.transport().push_count(), 1);
        assert_eq!(engine.store().pending_sync(EntityKind::Family).len(), 1);
        assert_eq!(engine.state(), SyncState::Error);
    }

    #[tokio::test]
    async fn missing_record_is_a_store_error() {
        let engine = engine();
        let err = engine
            .push_record(EntityKind::Family, EntityId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Store(CoreError::EntityNotFound { .. })));
    }

    #[tokio::test]
    async fn cancelled_engine_makes_no_calls() {
        let engine = engine();
        let user = engine
            .store()
            .create_user_profile(UserProfile::new("Sam", "hash-sam"))
            .unwrap();

        engine.cancel();
        let err = engine
            .push_record(EntityKind::UserProfile, user.id)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Cancelled));
        assert_eq!(engine.transport().push_count(), 0);

        engine.reset_cancel();
        assert!(engine.push_record(EntityKind::UserProfile, user.id).await.is_ok());
    }
}
