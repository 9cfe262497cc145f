//! Write transactions.
//!
//! Every mutation of the entity store runs inside a [`WriteTransaction`]:
//! - **Atomicity**: all staged writes commit together or none do
//! - **Isolation**: the transaction holds the store's single write guard,
//!   so readers never observe a half-applied change
//! - **Durability**: commit is delegated to the storage backend
//!
//! A transaction dropped without `commit` rolls back both the storage
//! backend and the in-memory state.

mod entities;
mod journal;
mod sync;
mod write;

pub use write::WriteTransaction;
