//! # Zonesync Store
//!
//! Storage abstraction for zonesync. Provides a trait-based interface for
//! object and ledger persistence with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The store module abstracts persistence behind the [`Store`] trait, so the
//! sync handlers never see SQL. The primary implementation is
//! [`SqliteStore`], with [`MemoryStore`] for testing.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`Ledger`] - A zone-scoped ledger and its head commit
//! - [`RefTransition`] - A head compare-and-swap applied with a batch
//!
//! ## Usage
//!
//! ```rust,no_run
//! use zonesync_core::{Oid, ZoneId};
//! use zonesync_store::{SqliteStore, Store};
//!
//! async fn example() {
//!     let store = SqliteStore::open("zonesync.db").unwrap();
//!     let ledger = store.create_ledger(ZoneId(1), "policies").await.unwrap();
//!     assert_eq!(ledger.head, Oid::ZERO);
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Compare-and-swap refs**: a head only moves when the caller presents
//!   its current value; a mismatch is reported as `RefMismatch`
//! - **Atomic batches**: `write_objects` upserts objects and moves the head
//!   in one transaction, rolled back as a whole on failure

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{
    validate_name, validate_object_key, validate_zone, Ledger, RefTransition, Store,
};

/// Get current time in milliseconds.
pub(crate) fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}
