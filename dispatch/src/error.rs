//! Error types for hook registration and outgoing writes.

use registry::{RegistryError, VersionReq};
use thiserror::Error;

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Errors that can occur when registering hooks or writing messages.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DispatchError {
    /// Resolution or coding through the registry failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The hooked name has no opcode in the active protocol.
    #[error("hook: unmapped message \"{name}\"")]
    UnmappedMessage { name: String },

    /// Wildcard hooks can only be raw or follow the latest version.
    #[error("hook: * hook must request version * or raw (given {version})")]
    WildcardVersion { version: u32 },

    /// The hooked version has been superseded and removed.
    #[error("hook: obsolete definition {name}.{version}")]
    ObsoleteDefinition { name: String, version: u32 },

    /// The hooked version does not exist.
    #[error("hook: definition not found {name}.{version}")]
    DefinitionNotFound { name: String, version: VersionReq },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_errors_are_transparent() {
        let err = DispatchError::from(RegistryError::UnmappedProtocol { protocol: 9 });
        assert_eq!(err.to_string(), "no mapping for protocol version 9");
    }

    #[test]
    fn hook_error_display() {
        let err = DispatchError::ObsoleteDefinition {
            name: "S_CHAT".to_string(),
            version: 2,
        };
        assert_eq!(err.to_string(), "hook: obsolete definition S_CHAT.2");
        let err = DispatchError::DefinitionNotFound {
            name: "S_CHAT".to_string(),
            version: VersionReq::Latest,
        };
        assert_eq!(err.to_string(), "hook: definition not found S_CHAT.*");
    }
}
