//! Data migration support.
//!
//! Migrations bring records written by an older version of the app up to
//! the current model: importing legacy rows, back-filling fields, repairing
//! sync metadata.
//!
//! Migrations are:
//! - **Versioned**: each has a unique, sequential version number
//! - **Forward-only**: there is no `down`
//! - **Explicit**: they are registered and run by the caller
//! - **Transactional**: each runs in one write transaction; a failure
//!   leaves the store exactly as it was before that migration
//!
//! ## Usage
//!
//! ```ignore
//! use kinsync_core::migration::{Migration, MigrationManager, MigrationState};
//!
//! struct ImportLegacyFamilies(Vec<Family>);
//! impl Migration for ImportLegacyFamilies {
//!     fn version(&self) -> u64 { 1 }
//!     fn name(&self) -> &str { "import_legacy_families" }
//!     fn up(&self, txn: &mut WriteTransaction<'_>) -> CoreResult<()> {
//!         for family in &self.0 {
//!             txn.import_record(family.clone().into())?;
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let mut manager = MigrationManager::new();
//! manager.register(Box::new(ImportLegacyFamilies(rows)))?;
//! let report = manager.run_pending(&store, &mut state);
//! assert!(report.is_complete());
//! ```

use crate::error::{CoreError, CoreResult};
use crate::store::EntityStore;
use crate::transaction::WriteTransaction;
use crate::types::{EntityKind, Timestamp};
use chrono::Utc;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Version number for migrations.
pub type MigrationVersion = u64;

/// A registered migration, as listed by [`MigrationManager::pending`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationInfo {
    /// Version number.
    pub version: MigrationVersion,
    /// Human-readable name.
    pub name: String,
}

/// A migration that rolled back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedMigration {
    /// Version of the migration.
    pub version: MigrationVersion,
    /// The error it returned.
    pub error: String,
}

/// Outcome of [`MigrationManager::run_pending`].
///
/// Runs stop at the first failure, so at most one migration has failed
/// and every version after it is still pending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Versions applied by this run, in order.
    pub applied: Vec<MigrationVersion>,
    /// The migration that stopped the run.
    pub failed: Option<FailedMigration>,
    /// Schema version after the run.
    pub final_version: MigrationVersion,
}

impl MigrationReport {
    /// True if every pending migration was applied.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_none()
    }
}

/// Trait for defining migrations.
pub trait Migration: Send + Sync {
    /// Returns the version number for this migration.
    ///
    /// Versions must be unique and sequential starting from 1.
    fn version(&self) -> MigrationVersion;

    /// Returns the name of this migration.
    fn name(&self) -> &str;

    /// Runs the migration inside `txn`.
    ///
    /// Returning an error rolls back everything the migration wrote.
    fn up(&self, txn: &mut WriteTransaction<'_>) -> CoreResult<()>;
}

/// Which migrations have been applied to a store, with when.
#[derive(Debug, Clone, Default)]
pub struct MigrationState {
    applied: BTreeMap<MigrationVersion, Timestamp>,
}

impl MigrationState {
    /// Creates a new empty migration state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest applied version, 0 if none.
    #[must_use]
    pub fn current_version(&self) -> MigrationVersion {
        self.applied.keys().next_back().copied().unwrap_or(0)
    }

    /// Checks if a version has been applied.
    #[must_use]
    pub fn is_applied(&self, version: MigrationVersion) -> bool {
        self.applied.contains_key(&version)
    }

    /// When `version` was applied.
    #[must_use]
    pub fn applied_at(&self, version: MigrationVersion) -> Option<Timestamp> {
        self.applied.get(&version).copied()
    }

    /// Records a migration as applied. The first record of a version wins.
    pub fn record(&mut self, version: MigrationVersion, applied_at: Timestamp) {
        self.applied.entry(version).or_insert(applied_at);
    }
}

/// Runs registered migrations against a store in version order.
#[derive(Default)]
pub struct MigrationManager {
    migrations: BTreeMap<MigrationVersion, Box<dyn Migration>>,
}

impl MigrationManager {
    /// Creates a new migration manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a migration.
    ///
    /// # Errors
    ///
    /// `MigrationFailed` if the version is already registered.
    pub fn register(&mut self, migration: Box<dyn Migration>) -> CoreResult<()> {
        let version = migration.version();
        if self.migrations.contains_key(&version) {
            return Err(CoreError::migration_failed(format!(
                "migration version {version} already registered"
            )));
        }
        self.migrations.insert(version, migration);
        Ok(())
    }

    /// Lists the migrations `state` has not applied yet.
    #[must_use]
    pub fn pending(&self, state: &MigrationState) -> Vec<MigrationInfo> {
        self.migrations
            .values()
            .filter(|m| !state.is_applied(m.version()))
            .map(|m| MigrationInfo {
                version: m.version(),
                name: m.name().to_string(),
            })
            .collect()
    }

    /// Checks that versions run 1, 2, 3, ... with no gap.
    ///
    /// # Errors
    ///
    /// `MigrationFailed` naming the first gap.
    pub fn validate(&self) -> CoreResult<()> {
        for (expected, version) in (1..).zip(self.migrations.keys()) {
            if *version != expected {
                return Err(CoreError::migration_failed(format!(
                    "migration version gap: expected {expected}, got {version}"
                )));
            }
        }
        Ok(())
    }

    /// Runs every pending migration in version order, each in its own
    /// write transaction, stopping at the first failure.
    ///
    /// A failed migration leaves the store exactly as the previous one
    /// left it.
    pub fn run_pending(&self, store: &EntityStore, state: &mut MigrationState) -> MigrationReport {
        let mut report = MigrationReport::default();

        for (version, migration) in &self.migrations {
            if state.is_applied(*version) {
                continue;
            }
            match store.write_transaction(|txn| migration.up(txn)) {
                Ok(()) => {
                    state.record(*version, Utc::now());
                    info!(version, name = migration.name(), "migration applied");
                    report.applied.push(*version);
                }
                Err(e) => {
                    warn!(version, name = migration.name(), error = %e, "migration failed, rolled back");
                    report.failed = Some(FailedMigration {
                        version: *version,
                        error: e.to_string(),
                    });
                    break;
                }
            }
        }

        report.final_version = state.current_version();
        report
    }
}

/// Built-in migration re-queuing every record an interrupted migration
/// left half-synced.
#[derive(Debug, Clone)]
pub struct RecoverPartialSync {
    version: MigrationVersion,
}

impl RecoverPartialSync {
    /// Creates the migration at `version`.
    #[must_use]
    pub fn new(version: MigrationVersion) -> Self {
        Self { version }
    }
}

impl Migration for RecoverPartialSync {
    fn version(&self) -> MigrationVersion {
        self.version
    }

    fn name(&self) -> &str {
        "recover_partial_sync"
    }

    fn up(&self, txn: &mut WriteTransaction<'_>) -> CoreResult<()> {
        for kind in EntityKind::ALL {
            txn.recover_partial_migrations(kind)?;
        }
        Ok(())
    }
}
