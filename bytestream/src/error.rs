//! Error types for byte stream operations.

use thiserror::Error;

/// Result type for byte stream operations.
pub type StreamResult<T> = Result<T, StreamError>;

/// Errors that can occur while reading or writing a message buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// Attempted to read past the end of the buffer.
    #[error("attempted to read {requested} bytes at position {position} but only {available} bytes available")]
    UnexpectedEof {
        /// Cursor position at the time of the read.
        position: usize,
        /// Number of bytes requested.
        requested: usize,
        /// Number of bytes available.
        available: usize,
    },

    /// Attempted to seek outside the buffer.
    #[error("cannot seek to position {target}, buffer length is {len}")]
    SeekOutOfBounds {
        /// Requested cursor position.
        target: usize,
        /// Buffer length.
        len: usize,
    },

    /// A position does not fit in a 16-bit offset field.
    #[error("position {position} does not fit in a 16-bit offset")]
    PositionOverflow {
        /// The position that overflowed.
        position: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_unexpected_eof() {
        let err = StreamError::UnexpectedEof {
            position: 6,
            requested: 4,
            available: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains("4 bytes"), "should mention requested bytes");
        assert!(msg.contains("position 6"), "should mention the cursor");
        assert!(msg.contains("1 bytes"), "should mention available bytes");
    }

    #[test]
    fn error_display_seek_out_of_bounds() {
        let err = StreamError::SeekOutOfBounds { target: 40, len: 12 };
        let msg = err.to_string();
        assert!(msg.contains("40"));
        assert!(msg.contains("12"));
    }

    #[test]
    fn error_display_position_overflow() {
        let err = StreamError::PositionOverflow { position: 70_000 };
        assert!(err.to_string().contains("70000"));
    }

    #[test]
    fn error_is_std_error() {
        fn assert_error<E: std::error::Error + Send + Sync + 'static>() {}
        assert_error::<StreamError>();
    }
}
