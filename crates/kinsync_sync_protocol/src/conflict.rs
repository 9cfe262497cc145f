//! Conflict detection and resolution.

use crate::error::{ProtocolError, ProtocolResult};
use crate::snapshot::RecordSnapshot;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// How a local and a remote version of the same record relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictScenario {
    /// The local version was modified later.
    LocalNewer,
    /// The remote version was modified later.
    RemoteNewer,
    /// Both were modified at the same instant.
    ConcurrentEdit,
}

impl ConflictScenario {
    /// Classifies two snapshots by `modified_at`.
    #[must_use]
    pub fn classify(local: &RecordSnapshot, remote: &RecordSnapshot) -> Self {
        match local.modified_at.cmp(&remote.modified_at) {
            Ordering::Greater => ConflictScenario::LocalNewer,
            Ordering::Less => ConflictScenario::RemoteNewer,
            Ordering::Equal => ConflictScenario::ConcurrentEdit,
        }
    }
}

/// A conflict between a local and a remote version of one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    /// The local version.
    pub local: RecordSnapshot,
    /// The remote version.
    pub remote: RecordSnapshot,
    /// How the versions relate.
    pub scenario: ConflictScenario,
    /// Resolution (if any).
    pub resolution: Option<ConflictResolution>,
}

impl Conflict {
    /// Creates an unresolved conflict.
    ///
    /// # Errors
    ///
    /// `IdentityMismatch` if the snapshots describe different records.
    pub fn new(local: RecordSnapshot, remote: RecordSnapshot) -> ProtocolResult<Self> {
        if !local.same_identity(&remote) {
            return Err(ProtocolError::IdentityMismatch {
                local_kind: local.kind,
                local_id: local.entity_id,
                remote_kind: remote.kind,
                remote_id: remote.entity_id,
            });
        }
        let scenario = ConflictScenario::classify(&local, &remote);
        Ok(Self {
            local,
            remote,
            scenario,
            resolution: None,
        })
    }

    /// True if both versions carry identical content.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.local.content_hash() == self.remote.content_hash()
    }

    /// Resolves the conflict with the given resolution.
    pub fn resolve(&mut self, resolution: ConflictResolution) {
        self.resolution = Some(resolution);
    }

    /// Returns true if the conflict has been resolved.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }

    /// The snapshot the resolution selects, if it selects one.
    #[must_use]
    pub fn winner(&self) -> Option<&RecordSnapshot> {
        match self.resolution? {
            ConflictResolution::KeepLocal => Some(&self.local),
            ConflictResolution::AcceptRemote => Some(&self.remote),
            ConflictResolution::Skip => None,
        }
    }
}

/// Resolution for a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictResolution {
    /// Keep the local version; it must be pushed before the record is
    /// clean.
    KeepLocal,
    /// Overwrite the local version with the remote one.
    AcceptRemote,
    /// Leave unresolved for the application to decide.
    Skip,
}

impl ConflictResolution {
    /// Converts to a code.
    #[must_use]
    pub fn to_code(&self) -> u8 {
        match self {
            ConflictResolution::KeepLocal => 1,
            ConflictResolution::AcceptRemote => 2,
            ConflictResolution::Skip => 4,
        }
    }

    /// Converts from a code.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(ConflictResolution::KeepLocal),
            2 => Some(ConflictResolution::AcceptRemote),
            4 => Some(ConflictResolution::Skip),
            _ => None,
        }
    }
}

/// Policy for automatic conflict resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConflictPolicy {
    /// Server always wins.
    ServerWins,
    /// Client always wins.
    ClientWins,
    /// The later `modified_at` wins; equal timestamps fall back to a
    /// content-hash comparison every replica agrees on.
    #[default]
    LastWriteWins,
    /// Manual resolution required.
    Manual,
}

impl ConflictPolicy {
    /// Returns true if this policy automatically resolves conflicts.
    #[must_use]
    pub fn auto_resolves(&self) -> bool {
        !matches!(self, ConflictPolicy::Manual)
    }

    /// Resolves a conflict according to this policy.
    pub fn resolve(&self, conflict: &mut Conflict) {
        let resolution = match self {
            ConflictPolicy::ServerWins => ConflictResolution::AcceptRemote,
            ConflictPolicy::ClientWins => ConflictResolution::KeepLocal,
            ConflictPolicy::LastWriteWins => last_write_wins(conflict),
            ConflictPolicy::Manual => ConflictResolution::Skip,
        };
        conflict.resolve(resolution);
    }

    /// Converts to a code.
    #[must_use]
    pub fn to_code(&self) -> u8 {
        match self {
            ConflictPolicy::ServerWins => 1,
            ConflictPolicy::ClientWins => 2,
            ConflictPolicy::LastWriteWins => 3,
            ConflictPolicy::Manual => 4,
        }
    }

    /// Converts from a code.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(ConflictPolicy::ServerWins),
            2 => Some(ConflictPolicy::ClientWins),
            3 => Some(ConflictPolicy::LastWriteWins),
            4 => Some(ConflictPolicy::Manual),
            _ => None,
        }
    }
}

fn last_write_wins(conflict: &Conflict) -> ConflictResolution {
    match conflict.scenario {
        ConflictScenario::LocalNewer => ConflictResolution::KeepLocal,
        ConflictScenario::RemoteNewer => ConflictResolution::AcceptRemote,
        ConflictScenario::ConcurrentEdit => {
            let local = conflict.local.content_hash();
            let remote = conflict.remote.content_hash();
            if local >= remote {
                ConflictResolution::KeepLocal
            } else {
                ConflictResolution::AcceptRemote
            }
        }
    }
}

/// Reconciles local and remote snapshots under a fixed policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictResolver {
    policy: ConflictPolicy,
}

impl ConflictResolver {
    /// Creates a resolver for `policy`.
    #[must_use]
    pub fn new(policy: ConflictPolicy) -> Self {
        Self { policy }
    }

    /// Returns the policy.
    #[must_use]
    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// Builds and resolves the conflict between `local` and `remote`.
    ///
    /// # Errors
    ///
    /// `IdentityMismatch` if the snapshots describe different records.
    pub fn resolve(&self, local: RecordSnapshot, remote: RecordSnapshot) -> ProtocolResult<Conflict> {
        let mut conflict = Conflict::new(local, remote)?;
        self.policy.resolve(&mut conflict);
        Ok(conflict)
    }
}
