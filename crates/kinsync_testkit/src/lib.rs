//! # KinSync Testkit
//!
//! Test utilities for KinSync.
//!
//! This crate provides:
//! - Test fixtures, store helpers and household scenarios
//! - Property-based test generators using proptest
//! - A performance check measuring time and memory against a budget
//! - Stress runs with concurrent readers
//! - Tracing setup for test binaries
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kinsync_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_store() {
//!     init_tracing();
//!     with_temp_store(|store| {
//!         let household = Household::create(store);
//!         assert!(store.has_parent_admin(household.family.id));
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod logging;
pub mod perf;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::*;
    pub use crate::perf::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use logging::*;
pub use perf::*;
pub use stress::*;
