//! Engine configuration loaded from TOML.

use std::fs;
use std::path::{Path, PathBuf};

use dispatch::DispatchLimits;
use registry::{Platform, ProtocolRegistry, RegistryResult};
use serde::{Deserialize, Serialize};

use crate::error::{ModuleError, ModuleResult};

/// Modules loaded before and unloaded after every other module.
pub const DEFAULT_CORE_MODULES: [&str; 2] = ["command", "tera-game-state"];

/// Limits applied to each connection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineLimits {
    pub wire: wire::Limits,
    pub dispatch: DispatchLimits,
}

impl EngineLimits {
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            wire: wire::Limits::for_testing(),
            dispatch: DispatchLimits::for_testing(),
        }
    }

    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            wire: wire::Limits::unlimited(),
            dispatch: DispatchLimits::unlimited(),
        }
    }
}

/// Top-level engine configuration.
///
/// ```toml
/// platform = "pc"
/// data_dir = "data"
/// module_dir = "mods"
/// support_url = "https://example.invalid/support"
/// core_modules = ["command", "tera-game-state"]
///
/// [limits.wire]
/// max_frame_bytes = 65535
///
/// [limits.dispatch]
/// max_deferred_writes = 64
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub platform: Platform,
    /// Registry data directory with `map/` and `protocol/`.
    pub data_dir: PathBuf,
    /// Directory holding one subdirectory per installed module.
    pub module_dir: PathBuf,
    /// Shown in module errors when a module declares no support URL.
    pub support_url: Option<String>,
    pub core_modules: Vec<String>,
    pub limits: EngineLimits,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            platform: Platform::default(),
            data_dir: PathBuf::from("data"),
            module_dir: PathBuf::from("mods"),
            support_url: None,
            core_modules: DEFAULT_CORE_MODULES.map(String::from).to_vec(),
            limits: EngineLimits::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml(source: &str) -> ModuleResult<Self> {
        toml::from_str(source).map_err(|source| ModuleError::Config { path: None, source })
    }

    /// Reads a TOML file. Relative directories are resolved against the
    /// file's parent directory.
    pub fn from_file(path: impl AsRef<Path>) -> ModuleResult<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| ModuleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = toml::from_str(&source).map_err(|source| ModuleError::Config {
            path: Some(path.to_path_buf()),
            source,
        })?;
        if let Some(base) = path.parent() {
            config.data_dir = base.join(&config.data_dir);
            config.module_dir = base.join(&config.module_dir);
        }
        Ok(config)
    }

    /// Loads the registry for the configured platform from `data_dir`.
    pub fn load_registry(&self) -> RegistryResult<ProtocolRegistry> {
        ProtocolRegistry::load(&self.data_dir, self.platform)
    }

    pub fn is_core(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.core_modules.iter().any(|core| core.to_lowercase() == name)
    }
}
