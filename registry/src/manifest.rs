//! The registry `manifest.json`: deprecation ranges and the client build table.
//!
//! ```json
//! {
//!   "deprecated": { "C_CHAT": { "1": { "writeUntil": 350000, "readUntil": 360000 } } },
//!   "builds": [ { "region": "EU", "major": 100, "minor": 2, "protocol": 376012 } ]
//! }
//! ```
//!
//! A version is writeable up to and including `writeUntil` and readable up to
//! and including `readUntil`; a missing bound never expires.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Access;

/// Protocol bounds after which a definition version may no longer be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Deprecation {
    pub write_until: Option<u32>,
    pub read_until: Option<u32>,
}

impl Deprecation {
    pub fn is_readable(&self, protocol: u32) -> bool {
        self.read_until.map_or(true, |until| protocol <= until)
    }

    pub fn is_writeable(&self, protocol: u32) -> bool {
        self.is_readable(protocol) && self.write_until.map_or(true, |until| protocol <= until)
    }

    pub fn allows(&self, access: Access, protocol: u32) -> bool {
        match access {
            Access::Read => self.is_readable(protocol),
            Access::Write => self.is_writeable(protocol),
        }
    }
}

/// A client build and the protocol version it speaks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    pub region: String,
    pub major: u32,
    pub minor: u32,
    pub protocol: u32,
}

/// Registry metadata loaded next to the map and definition directories.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    pub deprecated: BTreeMap<String, BTreeMap<u32, Deprecation>>,
    pub builds: Vec<Build>,
}

impl Manifest {
    /// Deprecation bounds for a definition version, unbounded if none are listed.
    pub fn deprecation(&self, name: &str, version: u32) -> Deprecation {
        self.deprecated
            .get(name)
            .and_then(|versions| versions.get(&version))
            .copied()
            .unwrap_or_default()
    }

    /// Finds the protocol version of a client build. Regions compare case-insensitively.
    pub fn protocol_for_build(&self, region: &str, major: u32, minor: u32) -> Option<u32> {
        self.builds
            .iter()
            .find(|build| {
                build.major == major && build.minor == minor && build.region.eq_ignore_ascii_case(region)
            })
            .map(|build| build.protocol)
    }
}
