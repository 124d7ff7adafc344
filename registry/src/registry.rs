//! Opcode tables and versioned definitions for every known protocol.

use std::collections::btree_map::Entry as VersionEntry;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use schema::{parse_def_file, Object, Schema};
use tracing::{debug, warn};

use crate::error::{Access, RegistryError, RegistryResult};
use crate::manifest::{Deprecation, Manifest};
use crate::map::{parse_map_file, OpcodeMap};
use crate::platform::Platform;
use crate::version::{DefVersion, DefVersions, Identifier, MissingDef, VersionReq};

const MAP_DIR: &str = "map";
const MAP_BASE_DIR: &str = "map_base";
const DEF_DIR: &str = "protocol";
const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone)]
struct Entry {
    schema: Arc<Schema>,
    platform_specific: bool,
}

/// A message resolved against one protocol version.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub name: String,
    pub opcode: u16,
    pub version: u32,
    pub latest_version: u32,
    pub definition: Arc<Schema>,
    pub deprecation: Deprecation,
}

impl Resolved {
    pub fn is_latest(&self) -> bool {
        self.version == self.latest_version
    }

    /// Fails if the version is deprecated for `access` at `protocol`.
    pub fn ensure(&self, access: Access, protocol: u32) -> RegistryResult<()> {
        if self.deprecation.allows(access, protocol) {
            Ok(())
        } else {
            Err(RegistryError::DeprecatedVersion {
                name: self.name.clone(),
                version: self.version,
                protocol,
                access,
            })
        }
    }

    /// Decodes a complete message with this definition.
    pub fn decode(&self, message: &[u8]) -> RegistryResult<Object> {
        self.definition
            .decode(message)
            .map_err(|source| RegistryError::Decode {
                name: self.name.clone(),
                version: self.version,
                source,
            })
    }

    /// Encodes a complete message, header included, with this definition.
    pub fn encode(&self, value: &Object) -> RegistryResult<Vec<u8>> {
        self.definition
            .encode(self.opcode, value)
            .map_err(|source| RegistryError::Encode {
                name: self.name.clone(),
                version: self.version,
                source,
            })
    }
}

/// Definitions for one platform, indexed by name and version, plus one
/// opcode table per protocol version.
///
/// The registry is immutable once shared; connections hold it behind an
/// [`Arc`] and resolve messages against their own protocol version.
#[derive(Debug, Clone, Default)]
pub struct ProtocolRegistry {
    platform: Platform,
    maps: HashMap<u32, OpcodeMap>,
    messages: HashMap<String, BTreeMap<u32, Entry>>,
    // Lowest version per name among platform-independent definitions.
    default_floor: HashMap<String, u32>,
    manifest: Manifest,
}

impl ProtocolRegistry {
    /// Creates an empty registry for `platform`.
    #[must_use]
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            ..Self::default()
        }
    }

    /// Loads a data directory.
    ///
    /// Reads `map/protocol.<ver>.map`, overlays `map_base/protocol.<ver>.map`
    /// when present, reads `protocol/<Name>.<ver>[.<platform>].def` and the
    /// optional `manifest.json`. Definitions tagged with another platform are
    /// ignored; definitions tagged with `platform` replace the default.
    pub fn load(path: impl AsRef<Path>, platform: Platform) -> RegistryResult<Self> {
        let mut registry = Self::new(platform);
        registry.load_dir(path.as_ref())?;
        Ok(registry)
    }

    /// Replaces all tables and definitions with the contents of `path`.
    ///
    /// On error the registry is left unchanged.
    pub fn reload(&mut self, path: impl AsRef<Path>) -> RegistryResult<()> {
        *self = Self::load(path, self.platform)?;
        Ok(())
    }

    fn load_dir(&mut self, base: &Path) -> RegistryResult<()> {
        let mut mapped = HashSet::new();

        for (dir, required) in [(MAP_DIR, true), (MAP_BASE_DIR, false)] {
            let dir = base.join(dir);
            if !required && !dir.is_dir() {
                continue;
            }
            for (file, path) in list_dir(&dir)? {
                let Some(protocol) = map_file_version(&file) else {
                    if file.starts_with("protocol.") && file.ends_with(".map") {
                        warn!(path = %path.display(), "invalid map filename syntax");
                    } else {
                        debug!(path = %path.display(), "skipping path");
                    }
                    continue;
                };
                let map = parse_map_file(&path).map_err(|source| RegistryError::Io {
                    path: path.clone(),
                    source,
                })?;
                mapped.extend(map.iter().map(|(name, _)| name.to_string()));
                self.maps.entry(protocol).or_default().overlay(map);
            }
        }

        let mut unmapped = BTreeSet::new();
        for (file, path) in list_dir(&base.join(DEF_DIR))? {
            let Some((name, version, tag)) = def_file_name(&file) else {
                if file.ends_with(".def") {
                    warn!(path = %path.display(), "invalid definition filename syntax");
                } else {
                    debug!(path = %path.display(), "skipping path");
                }
                continue;
            };
            if !mapped.contains(name) {
                unmapped.insert(name.to_string());
            }
            let platform_specific = match tag {
                None => false,
                Some(tag) if tag == self.platform.as_str() => true,
                Some(_) => continue,
            };
            let parsed = parse_def_file(&path).map_err(|source| RegistryError::Io {
                path: path.clone(),
                source,
            })?;
            self.add(name, version, parsed.schema, platform_specific);
        }
        for name in unmapped {
            warn!(name = name.as_str(), "unmapped message");
        }

        let manifest_path = base.join(MANIFEST_FILE);
        if manifest_path.is_file() {
            let source = fs::read_to_string(&manifest_path).map_err(|source| RegistryError::Io {
                path: manifest_path.clone(),
                source,
            })?;
            self.manifest = serde_json::from_str(&source).map_err(|source| {
                RegistryError::Manifest {
                    path: manifest_path.clone(),
                    source,
                }
            })?;
        }

        debug!(
            platform = %self.platform,
            protocols = self.maps.len(),
            messages = self.messages.len(),
            "loaded protocol data"
        );
        Ok(())
    }

    fn add(&mut self, name: &str, version: u32, schema: Schema, platform_specific: bool) {
        if !platform_specific {
            let floor = self.default_floor.entry(name.to_string()).or_insert(version);
            *floor = (*floor).min(version);
        }
        let entry = Entry {
            schema: Arc::new(schema),
            platform_specific,
        };
        match self.messages.entry(name.to_string()).or_default().entry(version) {
            VersionEntry::Vacant(slot) => {
                slot.insert(entry);
            }
            VersionEntry::Occupied(mut slot) => {
                if platform_specific {
                    slot.insert(entry);
                }
            }
        }
    }

    pub const fn platform(&self) -> Platform {
        self.platform
    }

    /// Installs the opcode table for `protocol`, replacing any previous one.
    pub fn insert_map(&mut self, protocol: u32, map: OpcodeMap) {
        self.maps.insert(protocol, map);
    }

    /// Adds a platform-independent definition. An existing platform
    /// override for the same version is kept.
    pub fn insert_definition(&mut self, name: &str, version: u32, schema: Schema) {
        self.add(name, version, schema, false);
    }

    /// Adds a definition tagged for `platform`. Returns `false` and ignores
    /// it if `platform` is not the registry's platform.
    pub fn insert_platform_definition(
        &mut self,
        name: &str,
        version: u32,
        platform: Platform,
        schema: Schema,
    ) -> bool {
        if platform != self.platform {
            return false;
        }
        self.add(name, version, schema, true);
        true
    }

    pub fn set_manifest(&mut self, manifest: Manifest) {
        self.manifest = manifest;
    }

    pub const fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn opcode_map(&self, protocol: u32) -> Option<&OpcodeMap> {
        self.maps.get(&protocol)
    }

    /// Protocol versions with an opcode table, ascending.
    pub fn protocols(&self) -> Vec<u32> {
        let mut protocols: Vec<u32> = self.maps.keys().copied().collect();
        protocols.sort_unstable();
        protocols
    }

    /// Every message name with at least one definition, sorted.
    pub fn message_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.messages.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// The numerically highest definition version of `name`.
    pub fn latest_version(&self, name: &str) -> Option<u32> {
        self.messages
            .get(name)
            .and_then(|versions| versions.keys().next_back().copied())
    }

    /// Definition versions of `name`, ascending.
    pub fn versions(&self, name: &str) -> impl Iterator<Item = u32> + '_ {
        self.messages
            .get(name)
            .into_iter()
            .flat_map(|versions| versions.keys().copied())
    }

    pub fn has_definition(&self, name: &str, version: u32) -> bool {
        self.messages
            .get(name)
            .is_some_and(|versions| versions.contains_key(&version))
    }

    pub fn definition(&self, name: &str, version: u32) -> Option<Arc<Schema>> {
        self.messages
            .get(name)
            .and_then(|versions| versions.get(&version))
            .map(|entry| Arc::clone(&entry.schema))
    }

    /// Looks up the protocol version of a client build in the manifest.
    pub fn protocol_for_build(&self, region: &str, major: u32, minor: u32) -> Option<u32> {
        self.manifest.protocol_for_build(region, major, minor)
    }

    /// Resolves a message name or opcode and a version against `protocol`.
    pub fn resolve<'a>(
        &self,
        protocol: u32,
        identifier: impl Into<Identifier<'a>>,
        version: impl Into<VersionReq>,
    ) -> RegistryResult<Resolved> {
        let map = self
            .maps
            .get(&protocol)
            .ok_or(RegistryError::UnmappedProtocol { protocol })?;
        let (name, opcode) = match identifier.into() {
            Identifier::Name(name) => {
                let opcode = map.opcode(name).ok_or_else(|| RegistryError::UnknownMessage {
                    protocol,
                    name: name.to_string(),
                })?;
                (name, opcode)
            }
            Identifier::Opcode(opcode) => {
                let name = map
                    .name(opcode)
                    .ok_or(RegistryError::UnmappedOpcode { protocol, opcode })?;
                (name, opcode)
            }
        };

        let version = version.into();
        let versions = self
            .messages
            .get(name)
            .ok_or_else(|| RegistryError::NoDefinitionFound {
                name: name.to_string(),
                version,
            })?;
        let latest_version = versions.keys().next_back().copied().ok_or_else(|| {
            RegistryError::NoDefinitionFound {
                name: name.to_string(),
                version,
            }
        })?;
        let wanted = match version {
            VersionReq::Latest => latest_version,
            VersionReq::Exact(wanted) => wanted,
        };
        let Some(entry) = versions.get(&wanted) else {
            return Err(if wanted < latest_version {
                RegistryError::DefinitionOutdated {
                    name: name.to_string(),
                    version: wanted,
                    latest: latest_version,
                }
            } else {
                RegistryError::NoDefinitionFound {
                    name: name.to_string(),
                    version,
                }
            });
        };

        Ok(Resolved {
            name: name.to_string(),
            opcode,
            version: wanted,
            latest_version,
            definition: Arc::clone(&entry.schema),
            deprecation: self.manifest.deprecation(name, wanted),
        })
    }

    /// Resolves and decodes a message, rejecting versions no longer readable.
    pub fn parse<'a>(
        &self,
        protocol: u32,
        identifier: impl Into<Identifier<'a>>,
        version: impl Into<VersionReq>,
        message: &[u8],
    ) -> RegistryResult<Object> {
        let resolved = self.resolve(protocol, identifier, version)?;
        resolved.ensure(Access::Read, protocol)?;
        resolved.decode(message)
    }

    /// Resolves and encodes a message, rejecting versions no longer writeable.
    pub fn write<'a>(
        &self,
        protocol: u32,
        identifier: impl Into<Identifier<'a>>,
        version: impl Into<VersionReq>,
        value: &Object,
    ) -> RegistryResult<Vec<u8>> {
        let resolved = self.resolve(protocol, identifier, version)?;
        resolved.ensure(Access::Write, protocol)?;
        resolved.encode(value)
    }

    /// Lists required definitions this registry cannot provide.
    /// `raw` requirements are always satisfied.
    pub fn check_definitions(&self, defs: &BTreeMap<String, DefVersions>) -> Vec<MissingDef> {
        defs.iter()
            .flat_map(|(name, versions)| {
                versions
                    .as_slice()
                    .iter()
                    .filter(move |version| match version {
                        DefVersion::Raw => false,
                        DefVersion::Version(version) => !self.has_definition(name, *version),
                    })
                    .map(move |&version| MissingDef {
                        name: name.clone(),
                        version,
                    })
            })
            .collect()
    }

    /// Drops definitions that can no longer be used with `protocol`.
    ///
    /// A definition is obsolete when its deprecation range makes it
    /// unreadable at `protocol`, or when it is a platform fork older than
    /// every platform-independent version of the same message. Returns the
    /// number of definitions removed.
    pub fn purge_obsolete(&mut self, protocol: u32) -> usize {
        let manifest = &self.manifest;
        let floors = &self.default_floor;
        let mut purged = 0;
        self.messages.retain(|name, versions| {
            let floor = floors.get(name).copied();
            versions.retain(|&version, entry| {
                let stale_fork = entry.platform_specific && floor.is_some_and(|f| version < f);
                let keep = !stale_fork && manifest.deprecation(name, version).is_readable(protocol);
                if !keep {
                    debug!(name = name.as_str(), version, "purging obsolete definition");
                    purged += 1;
                }
                keep
            });
            !versions.is_empty()
        });
        purged
    }
}

fn list_dir(dir: &Path) -> RegistryResult<Vec<(String, PathBuf)>> {
    let io_err = |source| RegistryError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        match path.file_name().and_then(|name| name.to_str()) {
            Some(name) => files.push((name.to_string(), path.clone())),
            None => debug!(path = %path.display(), "skipping path"),
        }
    }
    files.sort();
    Ok(files)
}

fn map_file_version(file: &str) -> Option<u32> {
    let version = file.strip_prefix("protocol.")?.strip_suffix(".map")?;
    is_digits(version).then(|| version.parse().ok()).flatten()
}

/// Splits `Name.Version[.platform].def`.
fn def_file_name(file: &str) -> Option<(&str, u32, Option<&str>)> {
    let stem = file.strip_suffix(".def")?;
    let mut parts = stem.split('.');
    let name = parts.next().filter(|name| is_word(name))?;
    let version = parts.next().filter(|version| is_digits(version))?;
    let tag = parts.next();
    if parts.next().is_some() || tag.is_some_and(|tag| !is_word(tag)) {
        return None;
    }
    Some((name, version.parse().ok()?, tag))
}

fn is_word(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
