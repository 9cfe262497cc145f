//! # KinSync Core
//!
//! Local object store for a family-organisation app.
//!
//! This crate provides:
//! - The entity model: [`Family`], [`UserProfile`], [`Membership`]
//! - Field and reference validation
//! - The [`EntityStore`] with unique-key lookups and atomic write
//!   transactions over a pluggable storage backend
//! - A relationship table with cascade rules for deletes
//! - Per-record sync state, including recovery of half-synced records
//! - Versioned data migrations
//!
//! ## Example
//!
//! ```rust
//! use kinsync_core::{EntityKind, EntityStore, Family, Membership, MembershipRole, UserProfile};
//!
//! let store = EntityStore::in_memory();
//! let user = store.create_user_profile(UserProfile::new("Sam", "hash-sam")).unwrap();
//! let family = store.create_family(Family::new("Test Family", "TEST123", user.id)).unwrap();
//! store
//!     .create_membership(Membership::new(family.id, user.id, MembershipRole::Adult))
//!     .unwrap();
//!
//! store.delete_family(family.id).unwrap();
//! assert_eq!(store.count(EntityKind::Membership), 0);
//! assert_eq!(store.count(EntityKind::UserProfile), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod config;
mod entity;
mod error;
pub mod migration;
mod model;
mod stats;
mod store;
mod sync_state;
mod transaction;
mod types;
pub mod validation;

pub use codec::EntityCodec;
pub use config::{StoreConfig, UserDeletionPolicy};
pub use entity::EntityId;
pub use error::{CoreError, CoreResult};
pub use migration::{Migration, MigrationManager, MigrationReport, MigrationState};
pub use model::{
    Family, Membership, MembershipRole, MembershipStatus, MembershipView, Record, RemoteId,
    SyncMetadata, SyncStatus, UserProfile,
};
pub use stats::{StatsSnapshot, StoreStats};
pub use store::{EntityStore, FamilyUpdate, UserProfileUpdate};
pub use sync_state::{DeletionReport, RecoveryReport};
pub use transaction::WriteTransaction;
pub use types::{EntityKind, Timestamp};
