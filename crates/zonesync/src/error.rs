//! Error types for the Node.

use thiserror::Error;
use zonesync_core::CoreError;
use zonesync_notp::NotpError;
use zonesync_store::StoreError;
use zonesync_sync::SyncError;

/// Errors that can occur during Node operations.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Wire framing error.
    #[error("packet error: {0}")]
    Notp(#[from] NotpError),

    /// Object model error.
    #[error("object error: {0}")]
    Core(#[from] CoreError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Sync error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// Ledger not found.
    #[error("ledger not found: {0}")]
    LedgerNotFound(String),

    /// Invalid operation.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

/// Result type for Node operations.
pub type Result<T> = std::result::Result<T, NodeError>;
