//! # KinSync Sync Protocol
//!
//! Types exchanged between a KinSync store and its remote record service.
//!
//! This crate provides:
//! - [`RecordSnapshot`], the replicated content of one record plus its
//!   recency and remote identity
//! - Push and pull messages with CBOR encoding
//! - [`ConflictResolver`] for reconciling a local and a remote snapshot
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod conflict;
mod error;
mod messages;
mod snapshot;

pub use conflict::{Conflict, ConflictPolicy, ConflictResolution, ConflictResolver, ConflictScenario};
pub use error::{ProtocolError, ProtocolResult};
pub use messages::{PullRequest, PullResponse, PushRequest, PushResponse, SyncMessage};
pub use snapshot::{ContentHash, RecordSnapshot};
