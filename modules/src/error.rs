//! Error types for extension discovery and lifecycle.

use std::io;
use std::path::PathBuf;

use dispatch::DispatchError;
use registry::MissingDef;
use thiserror::Error;

/// Result type for module operations.
pub type ModuleResult<T> = Result<T, ModuleError>;

/// A boxed extension error.
pub type ExtensionError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur when discovering, loading or unloading extensions.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModuleError {
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// `module.json` or `manifest.json` is not valid.
    #[error("invalid module information in {path}")]
    InvalidInfo {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration{}", path.as_ref().map(|p| format!(" in {}", p.display())).unwrap_or_default())]
    Config {
        path: Option<PathBuf>,
        #[source]
        source: toml::de::Error,
    },

    /// Two installed directories declare the same module name.
    #[error("duplicate module \"{name}\"")]
    Duplicate { name: String },

    /// The module uses definitions the registry does not have.
    #[error("module \"{name}\" uses outdated or unsupported messages: {}", list_defs(.missing))]
    MissingDefinitions {
        name: String,
        missing: Vec<MissingDef>,
    },

    #[error("module \"{name}\" requires \"{dependency}\" to be installed")]
    DependencyMissing { name: String, dependency: String },

    #[error("module \"{name}\" cannot be loaded while \"{conflict}\" is installed")]
    ConflictDetected { name: String, conflict: String },

    #[error("module \"{name}\" is not installed")]
    NotInstalled { name: String },

    #[error("module \"{name}\" is not loaded")]
    NotLoaded { name: String },

    #[error("module \"{name}\" does not support hot-reload")]
    NotReloadable { name: String },

    /// No extension implementation is registered under the module name.
    #[error("no implementation registered for module \"{name}\"")]
    NoImplementation { name: String },

    #[error("module \"{name}\" could not be loaded")]
    LoadFailed {
        name: String,
        #[source]
        source: ExtensionError,
    },

    #[error("module \"{name}\" could not be unloaded")]
    UnloadFailed {
        name: String,
        #[source]
        source: ExtensionError,
    },

    /// Saved hot-reload state does not match the reloaded extension.
    #[error("state for module \"{name}\" has format {found}, expected {expected}")]
    StateMismatch {
        name: String,
        expected: u32,
        found: u32,
    },

    /// The message name does not start with a known direction prefix.
    #[error("unknown message direction: {name}")]
    UnknownDirection { name: String },

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

fn list_defs(missing: &[MissingDef]) -> String {
    missing
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use registry::DefVersion;

    #[test]
    fn missing_definitions_display() {
        let err = ModuleError::MissingDefinitions {
            name: "skip-cutscenes".to_string(),
            missing: vec![
                MissingDef {
                    name: "S_PLAY_MOVIE".to_string(),
                    version: DefVersion::Version(1),
                },
                MissingDef {
                    name: "C_END_MOVIE".to_string(),
                    version: DefVersion::Version(1),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "module \"skip-cutscenes\" uses outdated or unsupported messages: S_PLAY_MOVIE.1, C_END_MOVIE.1"
        );
    }

    #[test]
    fn load_failure_keeps_source() {
        let err = ModuleError::LoadFailed {
            name: "broken".to_string(),
            source: anyhow::anyhow!("constructor failed").into(),
        };
        assert_eq!(err.to_string(), "module \"broken\" could not be loaded");
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("constructor failed"));
    }
}
