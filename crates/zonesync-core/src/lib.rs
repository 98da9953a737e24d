//! # Zonesync Core
//!
//! Identifiers, content-addressed objects, and commit history.
//!
//! ## Overview
//!
//! Ledgers record their policy history as a chain of commits. Each commit
//! points at a tree, and each tree lists blobs holding code. Every object is
//! framed as `"<type> <len>" 0xFF <content>` and addressed by the SHA-256 of
//! that frame.
//!
//! This crate is pure computation. Storage is reached through the async
//! lookup passed to [`build_commit_history`].
//!
//! ## Key Types
//!
//! - [`Oid`] - SHA-256 object identifier, [`Oid::ZERO`] for "no commit"
//! - [`Object`] - Framed bytes plus their OID
//! - [`Commit`], [`Tree`], [`ObjectHeader`] - Typed object contents
//!
//! ## Usage
//!
//! ```rust
//! use zonesync_core::{create_commit_object, Commit, Oid};
//!
//! let commit = Commit::new(Oid::hash(b"tree"), Oid::ZERO, "alice", 0, "alice", 0, "init");
//! let object = create_commit_object(&commit).unwrap();
//! assert_eq!(object.to_commit().unwrap(), commit);
//! ```

pub mod blob;
pub mod commit;
pub mod error;
pub mod history;
pub mod object;
pub mod tree;
pub mod types;

pub use blob::{deserialize_blob, serialize_blob, ObjectHeader};
pub use commit::Commit;
pub use error::{CoreError, Result};
pub use history::build_commit_history;
pub use object::{
    create_blob_object, create_commit_object, create_tree_object, frame_object, split_object,
    Object, ObjectInfo, ObjectInstance, ObjectType, OBJECT_NULL_BYTE,
};
pub use tree::{Tree, TreeEntry};
pub use types::{LedgerId, Oid, ZoneId};

/// Current Unix time in seconds.
pub fn now_secs() -> i64 {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("time went backwards")
        .as_secs();
    i64::try_from(secs).unwrap_or(i64::MAX)
}
