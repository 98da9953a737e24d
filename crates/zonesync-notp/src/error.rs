//! Error types for the NOTP wire layer.

use thiserror::Error;

/// Errors raised while framing or parsing NOTP packets.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotpError {
    /// No delimiter byte follows the header region.
    #[error("notp: delimiter not found")]
    DelimiterNotFound,

    /// The header region is not exactly the expected number of fields.
    #[error("notp: invalid data: missing or invalid header")]
    InvalidHeader,

    /// The header announces more payload bytes than the buffer holds.
    #[error("notp: truncated payload: expected {expected} bytes, {available} available")]
    TruncatedPayload { expected: usize, available: usize },

    /// The packet has no protocol record (reading) or none was written yet (appending).
    #[error("notp: missing protocol packet")]
    MissingProtocol,

    /// A protocol record already exists in the buffer.
    #[error("notp: protocol packet already written")]
    ProtocolAlreadyWritten,

    /// The stream group has been read to its last record.
    #[error("notp: data packet already complete")]
    StreamComplete,

    /// A delimited field is absent or has the wrong width.
    #[error("notp: missing data for {0}")]
    MissingField(&'static str),

    /// A decoded record carries a different type tag than the one requested.
    #[error("notp: unexpected packet type: expected {expected:#x}, got {actual:#x}")]
    UnexpectedPacketType { expected: u64, actual: u64 },

    /// A packet could not be serialized.
    #[error("notp: failed to serialize packet: {0}")]
    Serialization(String),

    /// A packet could not be deserialized.
    #[error("notp: failed to deserialize packet: {0}")]
    Deserialization(String),
}

/// Result type for NOTP operations.
pub type Result<T> = std::result::Result<T, NotpError>;
