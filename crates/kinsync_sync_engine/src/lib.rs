//! # KinSync Sync Engine
//!
//! Keeps a local [`EntityStore`](kinsync_core::EntityStore) in step with a
//! remote record store.
//!
//! This crate provides:
//! - The [`SyncTransport`] contract and a configurable [`MockTransport`]
//! - Push of dirty records, referenced kinds first
//! - Conflict settlement through the protocol's conflict resolver
//! - Per-call timeout and cooperative cancellation
//! - Retry with exponential backoff
//!
//! ## Guarantees
//!
//! - The local record is the source of truth until a push is confirmed
//! - A failed, timed-out or cancelled call commits nothing locally
//! - A local write racing a push keeps the record dirty
//! - Store locks are never held across an await point

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cancel;
mod config;
mod engine;
mod error;
mod state;
mod transport;

pub use cancel::CancelHandle;
pub use config::{RetryConfig, SyncConfig};
pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
pub use state::{RecordFailure, RecordOutcome, SyncReport, SyncState, SyncStats};
pub use transport::{InjectedFailure, MockTransport, SyncTransport, MOCK_REMOTE_WRITER};
