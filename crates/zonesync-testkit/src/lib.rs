//! # Zonesync Testkit
//!
//! Testing utilities for zonesync.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known packets and objects with their exact bytes and OIDs
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: A node with a ready ledger and commit helpers
//! - **Driver**: Runs a whole pull or push between two nodes in process
//!
//! ## Golden Vectors
//!
//! ```rust
//! use zonesync_testkit::vectors::verify_all_vectors;
//!
//! for (name, matches, actual) in verify_all_vectors() {
//!     assert!(matches, "{name}: {actual}");
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use zonesync_core::create_commit_object;
//! use zonesync_testkit::generators::{commit_from_params, CommitParams};
//!
//! proptest! {
//!     #[test]
//!     fn commit_oid_is_deterministic(params: CommitParams) {
//!         let a = create_commit_object(&commit_from_params(&params)).unwrap();
//!         let b = create_commit_object(&commit_from_params(&params)).unwrap();
//!         prop_assert_eq!(a.oid(), b.oid());
//!     }
//! }
//! ```
//!
//! ## Syncing Two Nodes
//!
//! ```rust,ignore
//! use zonesync_core::Oid;
//! use zonesync_testkit::{driver, Route, TestFixture};
//!
//! let store = TestFixture::new("policies").await?;
//! let peer = TestFixture::new("policies").await?;
//! let route = Route { zone_id: peer.zone_id, local: peer.ledger_id, remote: store.ledger_id };
//!
//! let report = driver::pull(&peer.node, store.node.sync_host(), &route, Oid::ZERO).await?;
//! ```

pub mod driver;
pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use driver::{Route, SyncReport};
pub use fixtures::{sample_policy, TestFixture, TEST_ZONE};
pub use generators::{commit_from_params, CommitParams};
pub use vectors::{object_vectors, verify_all_vectors, wire_vectors, ObjectVector, WireVector};
