//! Protocol error types.

use kinsync_core::{CoreError, EntityId, EntityKind};
use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while building, encoding or comparing snapshots.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// CBOR encoding or decoding failed.
    #[error("protocol codec error: {0}")]
    Codec(String),

    /// Two snapshots that must describe the same record do not.
    #[error("snapshot identity mismatch: local {local_kind} {local_id}, remote {remote_kind} {remote_id}")]
    IdentityMismatch {
        /// Kind of the local snapshot.
        local_kind: EntityKind,
        /// Id of the local snapshot.
        local_id: EntityId,
        /// Kind of the remote snapshot.
        remote_kind: EntityKind,
        /// Id of the remote snapshot.
        remote_id: EntityId,
    },

    /// Converting between a snapshot and a record failed.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl ProtocolError {
    pub(crate) fn codec(err: impl std::fmt::Display) -> Self {
        Self::Codec(err.to_string())
    }
}
