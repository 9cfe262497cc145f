//! Protocol messages for sync.

use crate::error::{ProtocolError, ProtocolResult};
use crate::snapshot::RecordSnapshot;
use kinsync_core::{RemoteId, Timestamp};
use serde::{Deserialize, Serialize};

/// A sync protocol message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMessage {
    /// Push request.
    PushRequest(PushRequest),
    /// Push response.
    PushResponse(PushResponse),
    /// Pull request.
    PullRequest(PullRequest),
    /// Pull response.
    PullResponse(PullResponse),
}

impl SyncMessage {
    /// Returns the message type code.
    #[must_use]
    pub fn type_code(&self) -> u8 {
        match self {
            SyncMessage::PushRequest(_) => 1,
            SyncMessage::PushResponse(_) => 2,
            SyncMessage::PullRequest(_) => 3,
            SyncMessage::PullResponse(_) => 4,
        }
    }

    /// Encodes to CBOR.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::into_writer(self, &mut bytes).map_err(ProtocolError::codec)?;
        Ok(bytes)
    }

    /// Decodes from CBOR.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a sync message.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        ciborium::from_reader(bytes).map_err(ProtocolError::codec)
    }
}

/// Uploads one record version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushRequest {
    /// Device sending the push.
    pub device_id: String,
    /// The version being pushed. `remote_id` is `None` on first push.
    pub snapshot: RecordSnapshot,
}

impl PushRequest {
    /// Creates a new push request.
    #[must_use]
    pub fn new(device_id: impl Into<String>, snapshot: RecordSnapshot) -> Self {
        Self {
            device_id: device_id.into(),
            snapshot,
        }
    }
}

/// Acknowledges a push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushResponse {
    /// Identifier the remote stores the record under.
    pub remote_id: RemoteId,
    /// When the remote accepted the push.
    pub accepted_at: Timestamp,
}

/// Fetches the remote version of a record.
///
/// A pull tells the remote that `device_id` has seen the version it gets
/// back, so a later push from that device is not treated as a conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// Device asking.
    pub device_id: String,
    /// Identifier of the record at the remote.
    pub remote_id: RemoteId,
}

impl PullRequest {
    /// Creates a new pull request.
    #[must_use]
    pub fn new(device_id: impl Into<String>, remote_id: RemoteId) -> Self {
        Self {
            device_id: device_id.into(),
            remote_id,
        }
    }
}

/// Carries the remote version of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullResponse {
    /// The remote version.
    pub snapshot: RecordSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kinsync_core::{EntityId, UserProfile};

    fn snapshot() -> RecordSnapshot {
        RecordSnapshot::from_record(&UserProfile::new("Sam", "hash-sam").into()).unwrap()
    }

    #[test]
    fn push_request_over_the_wire() {
        let message = SyncMessage::PushRequest(PushRequest::new("device-1", snapshot()));
        assert_eq!(message.type_code(), 1);

        let decoded = SyncMessage::decode(&message.encode().unwrap()).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn responses_over_the_wire() {
        let push = SyncMessage::PushResponse(PushResponse {
            remote_id: RemoteId::new("ck-1"),
            accepted_at: Utc::now(),
        });
        let pull = SyncMessage::PullResponse(PullResponse {
            snapshot: snapshot(),
        });

        for message in [push, pull] {
            let decoded = SyncMessage::decode(&message.encode().unwrap()).unwrap();
            assert_eq!(decoded, message);
        }
    }

    #[test]
    fn type_codes_are_distinct() {
        let codes = [
            SyncMessage::PushRequest(PushRequest::new("d", snapshot())).type_code(),
            SyncMessage::PullRequest(PullRequest::new(
                "d",
                RemoteId::new(EntityId::new().to_string()),
            ))
            .type_code(),
        ];
        assert_ne!(codes[0], codes[1]);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(SyncMessage::decode(b"not cbor at all").is_err());
    }
}
