//! # Zonesync
//!
//! The unified API for zonesync: authorization policy ledgers with a
//! content-addressed commit history, replicated between a central store and
//! its peers.
//!
//! ## Overview
//!
//! - **Ledgers**: Zone-scoped, each with a head commit moved only by
//!   compare-and-swap
//! - **Objects**: Commits, trees, and blobs addressed by SHA-256
//! - **Sync**: Pull and push phase handlers over the NOTP packet framing
//!
//! ## Usage
//!
//! ```rust,no_run
//! use zonesync::{CodeEntry, CommitRequest, Node, NodeConfig};
//! use zonesync::core::ZoneId;
//! use zonesync::store::SqliteStore;
//!
//! async fn example() {
//!     let store = SqliteStore::open("zonesync.db").unwrap();
//!     let node = Node::new(store, NodeConfig::default());
//!
//!     let ledger = node.create_ledger(ZoneId(1), "policies").await.unwrap();
//!     let commit = node
//!         .commit(
//!             ZoneId(1),
//!             ledger.ledger_id,
//!             CommitRequest::new("initial policy")
//!                 .entry(CodeEntry::new("main", "policy-1", "permit(principal, action, resource);")),
//!         )
//!         .await
//!         .unwrap();
//!     println!("head is now {commit}");
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `zonesync::notp` - Packet framing
//! - `zonesync::core` - Identifiers and the object model
//! - `zonesync::store` - Storage abstraction and SQLite
//! - `zonesync::sync` - Pull and push handlers

pub mod error;
pub mod node;

// Re-export component crates
pub use zonesync_core as core;
pub use zonesync_notp as notp;
pub use zonesync_store as store;
pub use zonesync_sync as sync;

pub use error::{NodeError, Result};
pub use node::{CodeEntry, CommitRequest, Node, NodeConfig};

// Re-export commonly used types
pub use zonesync_core::{Commit, LedgerId, Object, Oid, ZoneId};
pub use zonesync_sync::{HandlerContext, HandlerReturn, PullPhase, PushPhase, SyncConfig, SyncHost};
