//! Error types for wire format operations.

use thiserror::Error;

/// Result type for wire format operations.
pub type WireResult<T> = Result<T, DecodeError>;

/// Decode errors for message framing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// Message is too small to contain the header.
    #[error("message too small: {actual} bytes, need at least {required}")]
    MessageTooSmall { actual: usize, required: usize },

    /// Declared length disagrees with the bytes supplied.
    #[error("length mismatch: header declares {header_len} bytes but {actual_len} supplied")]
    LengthMismatch { header_len: u16, actual_len: usize },

    /// A frame declared a length smaller than the header itself.
    #[error("frame declares length {length}, smaller than the message header")]
    FrameTooSmall { length: u16 },

    /// Limits exceeded.
    #[error("{kind} limit exceeded: {actual} > {limit}")]
    LimitsExceeded {
        kind: LimitKind,
        limit: usize,
        actual: usize,
    },
}

/// Specific wire limits that can be exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    FrameBytes,
    PendingFrames,
}

impl std::fmt::Display for LimitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::FrameBytes => "frame bytes",
            Self::PendingFrames => "pending frames",
        };
        write!(f, "{name}")
    }
}

/// Errors that can occur during encoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// Output buffer cannot hold the header.
    #[error("buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    /// Message is longer than the 16-bit length field allows.
    #[error("message length {length} does not fit in the 16-bit length field")]
    LengthOverflow { length: usize },
}
