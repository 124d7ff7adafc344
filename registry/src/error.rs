//! Error types for registry loading and message resolution.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::version::VersionReq;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Direction of use checked against deprecation ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    Read,
    Write,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

/// Errors that can occur when loading definitions or resolving messages.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RegistryError {
    /// No opcode table exists for the protocol version.
    #[error("no mapping for protocol version {protocol}")]
    UnmappedProtocol { protocol: u32 },

    /// The opcode has no name in the active table.
    #[error("mapping not found for opcode {opcode} (protocol {protocol})")]
    UnmappedOpcode { protocol: u32, opcode: u16 },

    /// The name has no opcode in the active table.
    #[error("code not known for message \"{name}\" (protocol {protocol})")]
    UnknownMessage { protocol: u32, name: String },

    /// No definition exists for the requested version.
    #[error("no definition found for message \"{name}\" (version {version})")]
    NoDefinitionFound { name: String, version: VersionReq },

    /// The requested version predates the oldest definition still kept.
    #[error("version {version} of message \"{name}\" is outdated and cannot be used anymore (latest {latest})")]
    DefinitionOutdated {
        name: String,
        version: u32,
        latest: u32,
    },

    /// The version is deprecated for this kind of use at the protocol version.
    #[error("version {version} of message \"{name}\" cannot be used to {access} on protocol {protocol}")]
    DeprecatedVersion {
        name: String,
        version: u32,
        protocol: u32,
        access: Access,
    },

    /// A platform name was not recognized.
    #[error("invalid platform \"{name}\"")]
    InvalidPlatform { name: String },

    /// A data directory or file could not be read.
    #[error("failed to read \"{}\"", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The registry manifest is not valid JSON for its format.
    #[error("invalid manifest \"{}\"", path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The message body does not match its definition.
    #[error("failed to decode {name}<{version}>")]
    Decode {
        name: String,
        version: u32,
        #[source]
        source: schema::DecodeError,
    },

    /// The value could not be encoded with its definition.
    #[error("failed to encode {name}<{version}>")]
    Encode {
        name: String,
        version: u32,
        #[source]
        source: schema::EncodeError,
    },
}
