//! Installed extension metadata read from `module.json` and `manifest.json`.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use registry::DefVersions;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{ModuleError, ModuleResult};

/// Where an extension runs. Only network extensions are bound to a
/// connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Network,
    Client,
}

/// When an extension is loaded during a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadOn {
    /// As soon as the connection is set up.
    Connect,
    /// Once the client's protocol version is known.
    #[default]
    #[serde(alias = "versionCheck")]
    VersionCheck,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModuleOptions {
    pub nice_name: Option<String>,
    pub reloadable: bool,
    pub load_on: LoadOn,
}

/// Metadata of one installed extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    /// Lowercased name, used as the module's identity.
    pub name: String,
    /// Name as declared.
    pub raw_name: String,
    pub path: PathBuf,
    pub category: Category,
    pub options: ModuleOptions,
    pub dependencies: Vec<String>,
    pub conflicts: Vec<String>,
    pub auto_update_disabled: bool,
    pub disabled: bool,
    pub support_url: Option<String>,
    pub author: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    /// Definitions the extension needs, from `manifest.json`.
    pub defs: BTreeMap<String, DefVersions>,
}

impl ModuleInfo {
    /// Metadata for an extension without any manifest files.
    pub fn new(raw_name: &str) -> Self {
        Self {
            name: raw_name.to_lowercase(),
            raw_name: raw_name.to_string(),
            path: PathBuf::new(),
            category: Category::default(),
            options: ModuleOptions::default(),
            dependencies: Vec::new(),
            conflicts: Vec::new(),
            auto_update_disabled: false,
            disabled: false,
            support_url: None,
            author: None,
            version: None,
            description: None,
            defs: BTreeMap::new(),
        }
    }

    /// `"Nice Name" (raw-name)` when a distinct display name exists.
    pub fn printable_name(&self) -> String {
        match &self.options.nice_name {
            Some(nice) if *nice != self.name => format!("\"{nice}\" ({})", self.raw_name),
            _ => format!("\"{}\"", self.raw_name),
        }
    }

    /// Parses `module.json` contents on top of the directory defaults.
    pub fn from_json(dir_name: &str, source: &str) -> Result<Self, serde_json::Error> {
        let file: ModuleFile = serde_json::from_str(source)?;
        let mut info = Self::new(file.name.as_deref().unwrap_or(dir_name));
        info.category = file.category;
        info.options = file.options;
        info.dependencies = file.dependencies.into_keys().collect();
        info.conflicts = file.conflicts;
        info.auto_update_disabled = file.disable_auto_update;
        info.disabled = file.disabled;
        info.support_url = file.support_url;
        info.author = file.author;
        info.version = file.version;
        info.description = file.description;
        Ok(info)
    }
}

/// On-disk `module.json`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ModuleFile {
    name: Option<String>,
    category: Category,
    options: ModuleOptions,
    /// Dependency name to update URL.
    dependencies: BTreeMap<String, String>,
    conflicts: Vec<String>,
    disable_auto_update: bool,
    disabled: bool,
    support_url: Option<String>,
    author: Option<String>,
    version: Option<String>,
    description: Option<String>,
}

/// On-disk extension `manifest.json`; only the required definitions matter
/// here.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ManifestFile {
    defs: BTreeMap<String, DefVersions>,
}

/// Lists extension directories under `root`, sorted by name.
///
/// Entries starting with `.` or `_` and plain files are skipped.
pub fn list_modules(root: &Path) -> ModuleResult<Vec<String>> {
    let io_err = |source| ModuleError::Io {
        path: root.to_path_buf(),
        source,
    };
    let mut names = Vec::new();
    for entry in fs::read_dir(root).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') || name.starts_with('_') {
            continue;
        }
        if !entry.file_type().map_err(io_err)?.is_dir() {
            debug!(path = %entry.path().display(), "skipping path");
            continue;
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}

/// Reads the metadata of `root/<dir_name>`.
///
/// A directory without `module.json` gets default metadata named after it.
pub fn load_module_info(root: &Path, dir_name: &str) -> ModuleResult<ModuleInfo> {
    let dir = root.join(dir_name);
    let mut info = match read_optional(&dir.join("module.json"))? {
        Some(source) => {
            ModuleInfo::from_json(dir_name, &source).map_err(|source| ModuleError::InvalidInfo {
                path: dir.join("module.json"),
                source,
            })?
        }
        None => ModuleInfo::new(dir_name),
    };

    if let Some(source) = read_optional(&dir.join("manifest.json"))? {
        let manifest: ManifestFile =
            serde_json::from_str(&source).map_err(|source| ModuleError::InvalidInfo {
                path: dir.join("manifest.json"),
                source,
            })?;
        info.defs = manifest.defs;
    }
    info.path = dir;
    Ok(info)
}

fn read_optional(path: &Path) -> ModuleResult<Option<String>> {
    trace!(path = %path.display(), "reading module file");
    match fs::read_to_string(path) {
        Ok(source) => Ok(Some(source)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ModuleError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
