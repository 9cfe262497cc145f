//! Record encoding for the storage backend.
//!
//! Records are stored as CBOR. The encoding is deterministic for a given
//! record value, which lets the sync layer hash payloads for conflict
//! detection.

use crate::entity::EntityId;
use crate::error::{CoreError, CoreResult};
use crate::model::{Family, Membership, Record, SyncMetadata, UserProfile};
use crate::types::EntityKind;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Trait for records that can be written to a storage backend.
///
/// Implementors must provide:
/// - `KIND`: the collection the record lives in
/// - `entity_id()`: the stable, immutable identifier used as storage key
///
/// `encode`/`decode` default to CBOR through serde.
pub trait EntityCodec: Serialize + DeserializeOwned + Sized {
    /// Collection this record type is stored in.
    const KIND: EntityKind;

    /// Returns the record's stable identifier.
    fn entity_id(&self) -> EntityId;

    /// Encodes the record to CBOR bytes.
    fn encode(&self) -> CoreResult<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::into_writer(self, &mut bytes).map_err(|e| CoreError::codec(e.to_string()))?;
        Ok(bytes)
    }

    /// Decodes a record from CBOR bytes.
    ///
    /// The `id` parameter is the storage key and must match the encoded id.
    fn decode(id: EntityId, bytes: &[u8]) -> CoreResult<Self> {
        let record: Self =
            ciborium::from_reader(bytes).map_err(|e| CoreError::codec(e.to_string()))?;
        if record.entity_id() != id {
            return Err(CoreError::codec(format!(
                "{} payload id {} does not match storage key {}",
                Self::KIND,
                record.entity_id(),
                id
            )));
        }
        Ok(record)
    }
}

impl EntityCodec for Family {
    const KIND: EntityKind = EntityKind::Family;

    fn entity_id(&self) -> EntityId {
        self.id
    }
}

impl EntityCodec for UserProfile {
    const KIND: EntityKind = EntityKind::UserProfile;

    fn entity_id(&self) -> EntityId {
        self.id
    }
}

impl EntityCodec for Membership {
    const KIND: EntityKind = EntityKind::Membership;

    fn entity_id(&self) -> EntityId {
        self.id
    }
}

impl Record {
    /// Encodes the wrapped record.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        match self {
            Record::Family(f) => f.encode(),
            Record::UserProfile(u) => u.encode(),
            Record::Membership(m) => m.encode(),
        }
    }

    /// Decodes a record of `kind` stored under `id`.
    pub fn decode(kind: EntityKind, id: EntityId, bytes: &[u8]) -> CoreResult<Self> {
        Ok(match kind {
            EntityKind::Family => Record::Family(Family::decode(id, bytes)?),
            EntityKind::UserProfile => Record::UserProfile(UserProfile::decode(id, bytes)?),
            EntityKind::Membership => Record::Membership(Membership::decode(id, bytes)?),
        })
    }

    /// Encodes only the replicated content of the record.
    ///
    /// Sync metadata is replica-local, so it is reset before encoding: two
    /// replicas holding the same field values produce identical bytes.
    pub fn encode_content(&self) -> CoreResult<Vec<u8>> {
        let mut content = self.clone();
        *content.sync_mut() = SyncMetadata::content_only();
        content.encode()
    }

    /// Decodes bytes produced by [`encode_content`](Self::encode_content).
    ///
    /// The returned record carries neutral sync metadata; callers set the
    /// fields they know.
    pub fn decode_content(kind: EntityKind, id: EntityId, bytes: &[u8]) -> CoreResult<Self> {
        Self::decode(kind, id, bytes)
    }
}
