//! Error types for the sync handlers.

use thiserror::Error;
use zonesync_core::{CoreError, Oid};
use zonesync_notp::NotpError;
use zonesync_store::StoreError;

/// Errors that can occur while handling a sync phase.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Session or packet input rejected before any storage work.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The ledger head moved since the session read it.
    #[error("ref conflict: expected {expected}, found {actual}")]
    RefConflict { expected: Oid, actual: Oid },

    /// The session's ledger does not exist in its zone.
    #[error("ledger not found: {0}")]
    LedgerNotFound(String),

    /// A commit, tree, or tree entry is missing from the object store.
    #[error("object not found: {0}")]
    ObjectNotFound(Oid),

    /// An incoming object's content does not hash to its announced OID.
    #[error("object id mismatch: announced {announced}, content hashes to {actual}")]
    ObjectIdMismatch { announced: Oid, actual: Oid },

    /// A phase name did not match any handler.
    #[error("unknown phase: {0}")]
    UnknownPhase(String),

    /// Wire framing error.
    #[error("packet error: {0}")]
    Notp(#[from] NotpError),

    /// Object model error.
    #[error("object error: {0}")]
    Core(#[from] CoreError),

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RefMismatch { expected, actual } => {
                SyncError::RefConflict { expected, actual }
            }
            StoreError::LedgerNotFound(id) => SyncError::LedgerNotFound(id),
            other => SyncError::Store(other),
        }
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ref_mismatch_becomes_conflict() {
        let err: SyncError = StoreError::RefMismatch {
            expected: Oid::ZERO,
            actual: Oid::hash(b"x"),
        }
        .into();
        assert!(matches!(
            err,
            SyncError::RefConflict { expected, .. } if expected == Oid::ZERO
        ));

        let err: SyncError = StoreError::InvalidInput("zone".into()).into();
        assert!(matches!(err, SyncError::Store(StoreError::InvalidInput(_))));
    }
}
