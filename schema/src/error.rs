//! Error types for schema building, parsing and message coding.

use std::fmt;

use bytestream::StreamError;
use thiserror::Error;

/// Result type for schema construction.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result type for message decoding.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Result type for message encoding.
pub type EncodeResult<T> = Result<T, EncodeError>;

/// Errors that can occur when building or validating a schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Two fields at the same level share a name.
    #[error("duplicate field \"{path}\"")]
    DuplicateField { path: String },

    /// A field name is empty or contains a path separator.
    #[error("invalid field name \"{name}\"")]
    InvalidName { name: String },

    /// An explicit header names no variable-length field at its level.
    #[error("header \"{path}\" does not refer to an array, string or bytes field")]
    UnknownHeaderTarget { path: String },
}

/// A malformed line in a definition file. The line is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}\n    at \"{origin}\", line {line}")]
pub struct SchemaParseError {
    pub origin: String,
    pub line: usize,
    pub reason: ParseReason,
}

/// Why a definition line was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseReason {
    Malformed,
    UnknownType { name: String },
    InvalidSubtype { name: String },
    UnknownFlag { name: String },
    FlagOnNonArray { flag: String },
    NoParentToNest,
}

impl fmt::Display for ParseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => f.write_str("malformed line"),
            Self::UnknownType { name } => write!(f, "unknown type \"{name}\""),
            Self::InvalidSubtype { name } => write!(f, "invalid array subtype \"{name}\""),
            Self::UnknownFlag { name } => write!(f, "unknown flag \"{name}\""),
            Self::FlagOnNonArray { flag } => write!(f, "flag \"{flag}\" is only valid on arrays"),
            Self::NoParentToNest => f.write_str("nested line has no array or object to nest under"),
        }
    }
}

/// Errors that can occur while decoding a message body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// The buffer cannot hold the message header.
    #[error("message too small: {actual} bytes")]
    MessageTooSmall { actual: usize },

    /// A read or seek ran past the message.
    #[error("{path}: {source}")]
    Stream {
        path: String,
        #[source]
        source: StreamError,
    },

    /// A payload offset points into the header region of its level.
    #[error("{path}: invalid offset {offset} (inside header)")]
    OffsetInsideHeader { path: String, offset: u16 },

    /// An array element does not carry its own position.
    #[error("{path}: cannot find next element of array at {position} (found value {found})")]
    ElementMismatch {
        path: String,
        position: usize,
        found: u16,
    },

    /// The chain continues past the declared element count.
    #[error("{path}: found out of bounds element {index} (expected length {expected})")]
    ArrayOverflow {
        path: String,
        index: usize,
        expected: usize,
    },

    /// The chain ended before the declared element count.
    #[error("{path}: array length mismatch, found {found} (expected {expected})")]
    ArrayLengthMismatch {
        path: String,
        found: usize,
        expected: usize,
    },
}

/// Errors that can occur while encoding a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum EncodeError {
    /// A value does not match the field type.
    #[error("{path}: expected {expected}, found {found}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    /// An integer does not fit the field width.
    #[error("{path}: value {value} out of range for {expected}")]
    OutOfRange {
        path: String,
        expected: &'static str,
        value: i128,
    },

    /// More elements or bytes than a 16-bit count can describe.
    #[error("{path}: {len} elements exceed the 16-bit count")]
    CountOverflow { path: String, len: usize },

    /// The encoded message does not fit the 16-bit length field.
    #[error("message too large: {length} bytes")]
    MessageTooLarge { length: usize },
}
