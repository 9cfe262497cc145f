//! # KinSync Storage
//!
//! Persistent storage backend contract and implementations for KinSync.
//!
//! This crate provides the lowest-level storage abstraction. Backends are
//! **transactional key/value stores** grouped into named collections. They
//! do not interpret the values they hold; the entity store owns the record
//! encoding.
//!
//! ## Design Principles
//!
//! - Writes are staged until `commit()`; `rollback()` discards them
//! - Reads see staged writes (read-your-writes inside one transaction)
//! - No knowledge of families, users or memberships
//! - Must be `Send + Sync` so a store can be shared across threads
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral stores
//! - [`FileBackend`] - Snapshot-per-commit file persistence
//!
//! ## Example
//!
//! ```rust
//! use kinsync_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! backend.insert("family", [1u8; 16], b"payload".to_vec()).unwrap();
//! backend.commit().unwrap();
//! assert_eq!(backend.get("family", &[1u8; 16]).unwrap(), Some(b"payload".to_vec()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;
mod tables;

pub use backend::{RecordKey, StorageBackend};
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::{CommitSwitch, InMemoryBackend};
