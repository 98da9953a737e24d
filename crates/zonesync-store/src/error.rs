//! Error types for the store module.

use thiserror::Error;
use zonesync_core::Oid;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Input rejected before touching storage.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A ledger with this name already exists in the zone.
    #[error("ledger already exists: {0}")]
    LedgerExists(String),

    /// Ledger not found.
    #[error("ledger not found: {0}")]
    LedgerNotFound(String),

    /// The ledger ref did not hold the expected value.
    #[error("ref mismatch: expected {expected}, found {actual}")]
    RefMismatch { expected: Oid, actual: Oid },

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
