//! Error types for the sync engine.

use kinsync_core::RemoteId;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
///
/// None of them leaves partial state behind: a record whose sync failed
/// keeps its local content and stays flagged `needs_sync`.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error.
    #[error("network error: {message}")]
    Network {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The remote refused the device's credentials.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The remote holds a version the device has not seen.
    #[error("remote version of {remote_id} conflicts with the pushed one")]
    Conflict {
        /// Identifier of the conflicting remote record.
        remote_id: RemoteId,
    },

    /// The remote has no record under this identifier.
    #[error("remote record not found: {remote_id}")]
    NotFound {
        /// The identifier asked for.
        remote_id: RemoteId,
    },

    /// A remote call did not finish within the configured timeout.
    #[error("operation timed out")]
    Timeout,

    /// Sync was cancelled.
    #[error("sync cancelled")]
    Cancelled,

    /// Local store error during sync.
    #[error("store error: {0}")]
    Store(#[from] kinsync_core::CoreError),

    /// Snapshot or message could not be built or read.
    #[error("protocol error: {0}")]
    Protocol(#[from] kinsync_sync_protocol::ProtocolError),

    /// Invalid state transition.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Current state.
        from: String,
        /// Attempted target state.
        to: String,
    },
}

impl SyncError {
    /// Creates a retryable network error.
    pub fn network_retryable(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable network error.
    pub fn network_fatal(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Network { retryable, .. } => *retryable,
            SyncError::Timeout => true,
            _ => false,
        }
    }

    /// Returns true if the error ends the whole cycle rather than one
    /// record's sync.
    pub fn aborts_cycle(&self) -> bool {
        matches!(self, SyncError::Cancelled | SyncError::Auth(_))
    }
}
