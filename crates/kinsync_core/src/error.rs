//! Error types for KinSync core.

use crate::entity::EntityId;
use crate::types::EntityKind;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in KinSync core operations.
///
/// A lookup that finds nothing is not an error: fetches return `Ok(None)`.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] kinsync_storage::StorageError),

    /// Record encoding or decoding failed.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the failure.
        message: String,
    },

    /// A precondition on caller input was violated.
    #[error("invalid data: {message}")]
    InvalidData {
        /// Description of the invalid input.
        message: String,
    },

    /// A unique key is already taken by another record.
    #[error("constraint violation: {kind} with {field} '{value}' already exists")]
    ConstraintViolation {
        /// Kind of the record being written.
        kind: EntityKind,
        /// Name of the unique field.
        field: &'static str,
        /// The colliding value.
        value: String,
    },

    /// A mutation targeted a record that does not exist.
    #[error("{kind} not found: {id}")]
    EntityNotFound {
        /// Kind of the record.
        kind: EntityKind,
        /// The missing record's id.
        id: EntityId,
    },

    /// Transaction was aborted.
    #[error("transaction aborted: {reason}")]
    TransactionAborted {
        /// Reason for abort.
        reason: String,
    },

    /// Migration failed.
    #[error("migration failed: {message}")]
    MigrationFailed {
        /// Description of the failure.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Creates a constraint violation error.
    pub fn constraint_violation(
        kind: EntityKind,
        field: &'static str,
        value: impl Into<String>,
    ) -> Self {
        Self::ConstraintViolation {
            kind,
            field,
            value: value.into(),
        }
    }

    /// Creates an entity not found error.
    pub fn not_found(kind: EntityKind, id: EntityId) -> Self {
        Self::EntityNotFound { kind, id }
    }

    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates a transaction aborted error.
    pub fn transaction_aborted(reason: impl Into<String>) -> Self {
        Self::TransactionAborted {
            reason: reason.into(),
        }
    }

    /// Creates a migration failed error.
    pub fn migration_failed(message: impl Into<String>) -> Self {
        Self::MigrationFailed {
            message: message.into(),
        }
    }

    /// Returns true for errors caused by caller input.
    #[must_use]
    pub fn is_invalid_data(&self) -> bool {
        matches!(self, Self::InvalidData { .. })
    }

    /// Returns true for unique-key collisions.
    #[must_use]
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::ConstraintViolation { .. })
    }
}
