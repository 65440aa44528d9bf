//! Error types for qwire.

use thiserror::Error;

/// The main error type for encode and decode operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Tag not in the registry, or not legal for the negotiated protocol version.
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    /// A declared length runs past the end of the received bytes.
    #[error("Truncated message: needed {needed} bytes at offset {offset}, {available} available")]
    TruncatedMessage {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// The header length field disagrees with the received byte count.
    #[error("Framing mismatch: {0}")]
    FramingMismatch(String),

    /// Container invariant broken (length mismatch, malformed table, bad text).
    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    /// The peer answered with an error value.
    #[error("Remote error: '{0}")]
    Remote(String),

    /// The body is compressed; decompress before decoding.
    #[error("Compressed message: decompress the body before decoding")]
    CompressedMessage,
}

impl CodecError {
    /// Create an invalid structure error.
    pub fn structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure(message.into())
    }

    /// Create an unsupported type error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedType(message.into())
    }

    /// Create a framing mismatch error.
    pub fn framing(message: impl Into<String>) -> Self {
        Self::FramingMismatch(message.into())
    }

    /// Create a truncation error for a read of `needed` bytes at `offset`.
    pub fn truncated(offset: usize, needed: usize, available: usize) -> Self {
        Self::TruncatedMessage {
            offset,
            needed,
            available,
        }
    }

    /// True when the error carries a message from the remote process.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

/// Result type alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CodecError::truncated(12, 8, 3);
        assert_eq!(
            err.to_string(),
            "Truncated message: needed 8 bytes at offset 12, 3 available"
        );
    }

    #[test]
    fn test_remote_error_display() {
        let err = CodecError::Remote("type".into());
        assert_eq!(err.to_string(), "Remote error: 'type");
        assert!(err.is_remote());
        assert!(!CodecError::CompressedMessage.is_remote());
    }
}
