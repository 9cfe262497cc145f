//! Replicated record snapshots.

use crate::error::{ProtocolError, ProtocolResult};
use kinsync_core::{EntityId, EntityKind, Record, RemoteId, Timestamp};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 digest of a snapshot payload.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hashes `payload`.
    #[must_use]
    pub fn of(payload: &[u8]) -> Self {
        Self(Sha256::digest(payload).into())
    }

    /// Returns the raw digest.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({self})")
    }
}

/// The replicated state of one record at one replica.
///
/// `payload` is the record's content encoded without replica-local sync
/// metadata, so equal content hashes mean equal field values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSnapshot {
    /// Record kind.
    pub kind: EntityKind,
    /// Record id, shared by every replica.
    pub entity_id: EntityId,
    /// Remote identifier, once assigned.
    pub remote_id: Option<RemoteId>,
    /// Recency used for last-write-wins.
    pub modified_at: Timestamp,
    /// CBOR-encoded content.
    #[serde(with = "serde_bytes_vec")]
    pub payload: Vec<u8>,
}

impl RecordSnapshot {
    /// Captures the replicated content of a local record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be encoded.
    pub fn from_record(record: &Record) -> ProtocolResult<Self> {
        Ok(Self {
            kind: record.kind(),
            entity_id: record.id(),
            remote_id: record.sync().remote_id.clone(),
            modified_at: record.sync().modified_at,
            payload: record.encode_content()?,
        })
    }

    /// Rebuilds the record carried by this snapshot.
    ///
    /// The record's `modified_at` is the snapshot's; the other sync fields
    /// are neutral and are set when the record is applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload does not decode to a record of
    /// `kind` with `entity_id`.
    pub fn to_record(&self) -> ProtocolResult<Record> {
        let mut record = Record::decode_content(self.kind, self.entity_id, &self.payload)?;
        record.sync_mut().modified_at = self.modified_at;
        Ok(record)
    }

    /// Returns a copy carrying `remote_id`.
    #[must_use]
    pub fn with_remote_id(mut self, remote_id: RemoteId) -> Self {
        self.remote_id = Some(remote_id);
        self
    }

    /// SHA-256 of the payload.
    #[must_use]
    pub fn content_hash(&self) -> ContentHash {
        ContentHash::of(&self.payload)
    }

    /// True if both snapshots describe the same record.
    #[must_use]
    pub fn same_identity(&self, other: &Self) -> bool {
        self.kind == other.kind && self.entity_id == other.entity_id
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
    /// Returns an error if the bytes are not a snapshot.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        ciborium::from_reader(bytes).map_err(ProtocolError::codec)
    }
}

/// Serializes `Vec<u8>` as a CBOR byte string instead of an array of
/// integers.
mod serde_bytes_vec {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub(super) fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(bytes)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        struct BytesVisitor;

        impl<'de> Visitor<'de> for BytesVisitor {
            type Value = Vec<u8>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a byte string")
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
                Ok(v.to_vec())
            }

            fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
                Ok(v)
            }

            fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut out = Vec::new();
                while let Some(byte) = seq.next_element()? {
                    out.push(byte);
                }
                Ok(out)
            }
        }

        deserializer.deserialize_byte_buf(BytesVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kinsync_core::{Family, Membership, MembershipRole};

    #[test]
    fn snapshot_carries_record_content() {
        let family = Family::new("Test Family", "TEST123", EntityId::new());
        let snapshot = RecordSnapshot::from_record(&family.clone().into()).unwrap();

        assert_eq!(snapshot.kind, EntityKind::Family);
        assert_eq!(snapshot.entity_id, family.id);
        assert_eq!(snapshot.modified_at, family.sync.modified_at);

        let record = snapshot.to_record().unwrap();
        let rebuilt = record.as_family().unwrap();
        assert_eq!(rebuilt.code, "TEST123");
        assert_eq!(rebuilt.sync.modified_at, family.sync.modified_at);
    }

    #[test]
    fn hash_ignores_sync_metadata() {
        let family = Family::new("Test Family", "TEST123", EntityId::new());
        let mut synced = family.clone();
        synced.sync.mark_synced(RemoteId::new("ck-1"), Utc::now());

        let a = RecordSnapshot::from_record(&family.into()).unwrap();
        let b = RecordSnapshot::from_record(&synced.into()).unwrap();
        assert_eq!(a.content_hash(), b.content_hash());
        assert_ne!(a.remote_id, b.remote_id);
    }

    #[test]
    fn hash_tracks_content() {
        let mut family = Family::new("Test Family", "TEST123", EntityId::new());
        let before = RecordSnapshot::from_record(&family.clone().into()).unwrap();
        family.name = "Renamed".into();
        let after = RecordSnapshot::from_record(&family.into()).unwrap();
        assert_ne!(before.content_hash(), after.content_hash());
    }

    #[test]
    fn wire_encoding() {
        let membership = Membership::new(EntityId::new(), EntityId::new(), MembershipRole::Kid);
        let snapshot = RecordSnapshot::from_record(&membership.into())
            .unwrap()
            .with_remote_id(RemoteId::new("ck-m"));

        let decoded = RecordSnapshot::decode(&snapshot.encode().unwrap()).unwrap();
        assert_eq!(decoded, snapshot);
        assert!(RecordSnapshot::decode(&[0x01]).is_err());
    }

    #[test]
    fn wrong_kind_fails_to_rebuild() {
        let family = Family::new("Test Family", "TEST123", EntityId::new());
        let mut snapshot = RecordSnapshot::from_record(&family.into()).unwrap();
        snapshot.kind = EntityKind::UserProfile;
        assert!(snapshot.to_record().is_err());
    }

    #[test]
    fn hash_display_is_hex() {
        let hash = ContentHash::of(b"");
        assert_eq!(
            hash.to_string(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
