//! Protocol error types.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur during protocol operations.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame header bytes are not all ASCII digits. The stream is out of
    /// sync and the connection cannot be recovered.
    #[error("invalid frame header: {0:?}")]
    InvalidHeader([u8; 8]),

    /// Payload exceeds what an 8-digit length prefix can describe.
    #[error("frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// Peer closed the connection mid-frame (abrupt disconnect, as opposed
    /// to a clean close between frames).
    #[error("incomplete frame: expected {expected} bytes, got {received}")]
    IncompleteFrame { expected: usize, received: usize },

    /// Failed to serialize or deserialize a JSON payload.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error during read/write.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation timed out.
    #[error("timeout during {operation}")]
    Timeout { operation: String },
}

impl ProtocolError {
    /// Creates a timeout error for the named operation.
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Returns true when this error means the peer vanished mid-frame.
    pub fn is_abrupt_disconnect(&self) -> bool {
        matches!(self, Self::IncompleteFrame { .. })
    }
}
