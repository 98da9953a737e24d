//! Error types for zonesync core.

use thiserror::Error;

use crate::object::ObjectType;

/// Errors raised while building, framing, or parsing objects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid object id: {0}")]
    InvalidOid(String),

    #[error("invalid object format: {0}")]
    MalformedObject(String),

    #[error("unsupported object type: {0}")]
    UnsupportedObjectType(String),

    #[error("unexpected object type: expected {expected}, got {actual}")]
    UnexpectedObjectType {
        expected: ObjectType,
        actual: ObjectType,
    },

    #[error("invalid commit: {0}")]
    InvalidCommit(String),

    #[error("invalid tree: {0}")]
    InvalidTree(String),

    #[error("invalid blob: {0}")]
    InvalidBlob(String),

    #[error("invalid history start: zero commit cannot reach {0}")]
    InvalidHistoryStart(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
