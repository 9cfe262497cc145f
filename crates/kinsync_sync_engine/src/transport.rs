//! Transport layer abstraction for sync operations.

use crate::error::{SyncError, SyncResult};
use chrono::Utc;
use kinsync_core::{EntityId, EntityKind, RemoteId, Timestamp};
use kinsync_sync_protocol::{
    ConflictScenario, ProtocolError, PullRequest, PullResponse, PushRequest, PushResponse,
    RecordSnapshot, SyncMessage,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// A sync transport handles communication with the remote record store.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (a cloud client, the mock below for tests, ...).
pub trait SyncTransport: Send + Sync {
    /// Uploads one record version.
    ///
    /// Fails with `Conflict` when the remote holds a version of the record
    /// that this device has not seen.
    fn push(&self, request: &PushRequest) -> impl Future<Output = SyncResult<PushResponse>> + Send;

    /// Fetches the remote version of a record.
    ///
    /// Fails with `NotFound` when the remote has no such record.
    fn pull(&self, request: &PullRequest) -> impl Future<Output = SyncResult<PullResponse>> + Send;
}

/// Failure the mock transport can be told to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    /// Transient network error.
    Network,
    /// Network error that should not be retried.
    NetworkFatal,
    /// Credentials rejected.
    Auth,
    /// Remote record missing.
    NotFound,
}

impl InjectedFailure {
    fn into_error(self, remote_id: Option<&RemoteId>) -> SyncError {
        match self {
            InjectedFailure::Network => SyncError::network_retryable("injected network failure"),
            InjectedFailure::NetworkFatal => SyncError::network_fatal("injected fatal network failure"),
            InjectedFailure::Auth => SyncError::Auth("injected auth failure".into()),
            InjectedFailure::NotFound => SyncError::NotFound {
                remote_id: remote_id.cloned().unwrap_or_else(|| RemoteId::new("unassigned")),
            },
        }
    }
}

/// Writer recorded for versions seeded through the mock's setup methods.
pub const MOCK_REMOTE_WRITER: &str = "mock-remote";

#[derive(Debug)]
struct RemoteEntry {
    snapshot: RecordSnapshot,
    seen_by: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct RemoteState {
    records: BTreeMap<RemoteId, RemoteEntry>,
    by_identity: BTreeMap<(EntityKind, EntityId), RemoteId>,
    next_id: u64,
}

impl RemoteState {
    fn store(&mut self, snapshot: RecordSnapshot, writer: &str) -> RemoteId {
        let identity = (snapshot.kind, snapshot.entity_id);
        let remote_id = match self.by_identity.get(&identity) {
            Some(id) => id.clone(),
            None => {
                let id = match &snapshot.remote_id {
                    Some(id) => id.clone(),
                    None => {
                        self.next_id += 1;
                        RemoteId::new(format!("ck-{}-{}", snapshot.kind, self.next_id))
                    }
                };
                self.by_identity.insert(identity, id.clone());
                id
            }
        };

        let entry = RemoteEntry {
            snapshot: snapshot.with_remote_id(remote_id.clone()),
            seen_by: BTreeSet::from([writer.to_string()]),
        };
        self.records.insert(remote_id.clone(), entry);
        remote_id
    }

    fn push(&mut self, request: PushRequest) -> SyncResult<PushResponse> {
        let identity = (request.snapshot.kind, request.snapshot.entity_id);
        if let Some(remote_id) = self.by_identity.get(&identity) {
            let seen = self
                .records
                .get(remote_id)
                .is_some_and(|entry| entry.seen_by.contains(&request.device_id));
            if !seen {
                return Err(SyncError::Conflict {
                    remote_id: remote_id.clone(),
                });
            }
        }

        let remote_id = self.store(request.snapshot, &request.device_id);
        Ok(PushResponse {
            remote_id,
            accepted_at: Utc::now(),
        })
    }

    fn pull(&mut self, request: PullRequest) -> SyncResult<PullResponse> {
        let entry = self
            .records
            .get_mut(&request.remote_id)
            .ok_or_else(|| SyncError::NotFound {
                remote_id: request.remote_id.clone(),
            })?;
        entry.seen_by.insert(request.device_id);
        Ok(PullResponse {
            snapshot: entry.snapshot.clone(),
        })
    }
}

#[derive(Debug, Default)]
struct FailurePlan {
    next: VecDeque<InjectedFailure>,
    on_call: BTreeMap<u64, InjectedFailure>,
}

/// An in-process remote store for tests.
///
/// Every request and response is encoded to CBOR and decoded again on its
/// way through, so the wire format is exercised. A push conflicts when the
/// remote holds a version the pushing device has neither written nor
/// pulled.
#[derive(Debug, Default)]
pub struct MockTransport {
    remote: Mutex<RemoteState>,
    failures: Mutex<FailurePlan>,
    latency: Mutex<Duration>,
    calls: AtomicU64,
    pushes: AtomicU64,
    pulls: AtomicU64,
}

impl MockTransport {
    /// Creates an empty mock remote.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` calls fail with `failure`.
    pub fn fail_next(&self, count: usize, failure: InjectedFailure) {
        let mut plan = self.failures.lock();
        plan.next.extend(std::iter::repeat(failure).take(count));
    }

    /// Makes the call with the given 1-based number fail with `failure`.
    pub fn fail_call(&self, call_number: u64, failure: InjectedFailure) {
        self.failures.lock().on_call.insert(call_number, failure);
    }

    /// Drops every pending injected failure.
    pub fn clear_failures(&self) {
        let mut plan = self.failures.lock();
        plan.next.clear();
        plan.on_call.clear();
    }

    /// Delays every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Stores a version as if another device had pushed it.
    pub fn seed_remote(&self, snapshot: RecordSnapshot) -> RemoteId {
        self.remote.lock().store(snapshot, MOCK_REMOTE_WRITER)
    }

    /// Seeds a diverging remote version of a local record.
    ///
    /// `remote` carries the remote content; its `modified_at` is placed
    /// relative to `local_modified_at` according to `scenario`. The next
    /// push of the record from any device conflicts.
    pub fn stage_conflict(
        &self,
        scenario: ConflictScenario,
        mut remote: RecordSnapshot,
        local_modified_at: Timestamp,
    ) -> RemoteId {
        let offset = chrono::Duration::seconds(1);
        remote.modified_at = match scenario {
            ConflictScenario::LocalNewer => local_modified_at - offset,
            ConflictScenario::RemoteNewer => local_modified_at + offset,
            ConflictScenario::ConcurrentEdit => local_modified_at,
        };
        self.seed_remote(remote)
    }

    /// Returns the remote version stored under `remote_id`.
    pub fn remote_snapshot(&self, remote_id: &RemoteId) -> Option<RecordSnapshot> {
        self.remote
            .lock()
            .records
            .get(remote_id)
            .map(|entry| entry.snapshot.clone())
    }

    /// Returns the remote identifier of a record, if the remote has it.
    pub fn remote_id_of(&self, kind: EntityKind, id: EntityId) -> Option<RemoteId> {
        self.remote.lock().by_identity.get(&(kind, id)).cloned()
    }

    /// Number of records held by the remote.
    pub fn remote_len(&self) -> usize {
        self.remote.lock().records.len()
    }

    /// Number of push calls received, failed ones included.
    pub fn push_count(&self) -> u64 {
        self.pushes.load(Ordering::Relaxed)
    }

    /// Number of pull calls received, failed ones included.
    pub fn pull_count(&self) -> u64 {
        self.pulls.load(Ordering::Relaxed)
    }

    /// Numbers the call and returns the failure planned for it, if any.
    fn begin_call(&self) -> Option<InjectedFailure> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        let mut plan = self.failures.lock();
        plan.on_call.remove(&call).or_else(|| plan.next.pop_front())
    }

    async fn delay(&self) {
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

fn over_the_wire(message: SyncMessage) -> SyncResult<SyncMessage> {
    Ok(SyncMessage::decode(&message.encode()?)?)
}

fn unexpected(expected: &str, got: &SyncMessage) -> SyncError {
    ProtocolError::Codec(format!(
        "expected {expected}, got message type {}",
        got.type_code()
    ))
    .into()
}

impl SyncTransport for MockTransport {
    async fn push(&self, request: &PushRequest) -> SyncResult<PushResponse> {
        self.pushes.fetch_add(1, Ordering::Relaxed);
        let failure = self.begin_call();
        self.delay().await;
        if let Some(failure) = failure {
            return Err(failure.into_error(request.snapshot.remote_id.as_ref()));
        }

        let request = match over_the_wire(SyncMessage::PushRequest(request.clone()))? {
            SyncMessage::PushRequest(request) => request,
            other => return Err(unexpected("push request", &other)),
        };
        let response = self.remote.lock().push(request)?;
        match over_the_wire(SyncMessage::PushResponse(response))? {
            SyncMessage::PushResponse(response) => Ok(response),
            other => Err(unexpected("push response", &other)),
        }
    }

    async fn pull(&self, request: &PullRequest) -> SyncResult<PullResponse> {
        self.pulls.fetch_add(1, Ordering::Relaxed);
        let failure = self.begin_call();
        self.delay().await;
        if let Some(failure) = failure {
            return Err(failure.into_error(Some(&request.remote_id)));
        }

        let request = match over_the_wire(SyncMessage::PullRequest(request.clone()))? {
            SyncMessage::PullRequest(request) => request,
            other => return Err(unexpected("pull request", &other)),
        };
        let response = self.remote.lock().pull(request)?;
        match over_the_wire(SyncMessage::PullResponse(response))? {
            SyncMessage::PullResponse(response) => Ok(response),
            other => Err(unexpected("pull response", &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinsync_core::{Family, UserProfile};

    fn snapshot() -> RecordSnapshot {
        RecordSnapshot::from_record(&UserProfile::new("Sam", "hash-sam").into()).unwrap()
    }

    #[tokio::test]
    async fn push_assigns_remote_id_and_pull_returns_it() {
        let transport = MockTransport::new();
        let snapshot = snapshot();

        let pushed = transport
            .push(&PushRequest::new("device-a", snapshot.clone()))
            .await
            .unwrap();
        assert!(pushed.remote_id.as_str().starts_with("ck-user_profile-"));
        assert_eq!(transport.remote_len(), 1);
        assert_eq!(
            transport.remote_id_of(snapshot.kind, snapshot.entity_id),
            Some(pushed.remote_id.clone())
        );

        let pulled = transport
            .pull(&PullRequest::new("device-a", pushed.remote_id.clone()))
            .await
            .unwrap();
        assert_eq!(pulled.snapshot.content_hash(), snapshot.content_hash());
        assert_eq!(pulled.snapshot.remote_id, Some(pushed.remote_id));
    }

    #[tokio::test]
    async fn unseen_remote_version_conflicts_until_pulled() {
        let transport = MockTransport::new();
        let snapshot = snapshot();
        let remote_id = transport.seed_remote(snapshot.clone());

        let err = transport
            .push(&PushRequest::new("device-a", snapshot.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Conflict { remote_id: ref id } if *id == remote_id));

        transport
            .pull(&PullRequest::new("device-a", remote_id.clone()))
            .await
            .unwrap();
        let pushed = transport
            .push(&PushRequest::new("device-a", snapshot))
            .await
            .unwrap();
        assert_eq!(pushed.remote_id, remote_id);
    }

    #[tokio::test]
    async fn own_versions_never_conflict() {
        let transport = MockTransport::new();
        let snapshot = snapshot();
        for _ in 0..3 {
            transport
                .push(&PushRequest::new("device-a", snapshot.clone()))
                .await
                .unwrap();
        }
        assert_eq!(transport.remote_len(), 1);
        assert_eq!(transport.push_count(), 3);
    }

    #[tokio::test]
    async fn injected_failures() {
        let transport = MockTransport::new();
        transport.fail_next(2, InjectedFailure::Network);
        transport.fail_call(4, InjectedFailure::Auth);

        let request = PushRequest::new("device-a", snapshot());
        assert!(transport.push(&request).await.unwrap_err().is_retryable());
        assert!(transport.push(&request).await.unwrap_err().is_retryable());
        assert!(transport.push(&request).await.is_ok());
        assert!(matches!(transport.push(&request).await, Err(SyncError::Auth(_))));
        assert!(transport.push(&request).await.is_ok());
    }

    #[tokio::test]
    async fn missing_record_is_not_found() {
        let transport = MockTransport::new();
        let err = transport
            .pull(&PullRequest::new("device-a", RemoteId::new("ck-missing")))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NotFound { .. }));
        assert_eq!(transport.pull_count(), 1);
    }

    #[tokio::test]
    async fn staged_conflict_places_remote_recency() {
        let transport = MockTransport::new();
        let family = Family::new("Local", "TEST123", EntityId::new());
        let local = RecordSnapshot::from_record(&family.clone().into()).unwrap();

        let remote_id = transport.stage_conflict(
            ConflictScenario::RemoteNewer,
            local.clone(),
            local.modified_at,
        );
        let stored = transport.remote_snapshot(&remote_id).unwrap();
        assert_eq!(ConflictScenario::classify(&local, &stored), ConflictScenario::RemoteNewer);
    }

    #[tokio::test(start_paused = true)]
    async fn latency_delays_calls() {
        let transport = MockTransport::new();
        transport.set_latency(Duration::from_secs(5));

        let started = tokio::time::Instant::now();
        transport
            .push(&PushRequest::new("device-a", snapshot()))
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_secs(5));
    }
}
