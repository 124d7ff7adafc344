//! Message identifiers and definition version selectors.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A message named either by its definition name or by its opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Identifier<'a> {
    Name(&'a str),
    Opcode(u16),
}

impl<'a> From<&'a str> for Identifier<'a> {
    fn from(name: &'a str) -> Self {
        Self::Name(name)
    }
}

impl From<u16> for Identifier<'_> {
    fn from(opcode: u16) -> Self {
        Self::Opcode(opcode)
    }
}

impl fmt::Display for Identifier<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Opcode(opcode) => write!(f, "opcode {opcode}"),
        }
    }
}

/// Which definition version to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VersionReq {
    /// The numerically highest version present.
    #[default]
    Latest,
    Exact(u32),
}

impl From<u32> for VersionReq {
    fn from(version: u32) -> Self {
        Self::Exact(version)
    }
}

impl FromStr for VersionReq {
    type Err = std::num::ParseIntError;

    /// Accepts `*`, `latest` or a decimal version number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "*" | "latest" => Ok(Self::Latest),
            other => other.parse().map(Self::Exact),
        }
    }
}

impl fmt::Display for VersionReq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str("*"),
            Self::Exact(version) => write!(f, "{version}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum RawTag {
    #[serde(rename = "raw")]
    Raw,
}

/// A definition version an extension declares it needs.
///
/// Serialized as a number or the string `"raw"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DefVersion {
    /// Raw hooks need no definition.
    Raw,
    Version(u32),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum DefVersionRepr {
    Version(u32),
    Raw(RawTag),
}

impl Serialize for DefVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            Self::Raw => DefVersionRepr::Raw(RawTag::Raw),
            Self::Version(version) => DefVersionRepr::Version(version),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DefVersion {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match DefVersionRepr::deserialize(deserializer)? {
            DefVersionRepr::Version(version) => Self::Version(version),
            DefVersionRepr::Raw(RawTag::Raw) => Self::Raw,
        })
    }
}

impl fmt::Display for DefVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw => f.write_str("raw"),
            Self::Version(version) => write!(f, "{version}"),
        }
    }
}

/// One or several required versions of a single message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefVersions {
    One(DefVersion),
    Many(Vec<DefVersion>),
}

impl DefVersions {
    /// Returns the versions as a slice.
    pub fn as_slice(&self) -> &[DefVersion] {
        match self {
            Self::One(version) => std::slice::from_ref(version),
            Self::Many(versions) => versions,
        }
    }
}

/// A required definition that the registry cannot provide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MissingDef {
    pub name: String,
    pub version: DefVersion,
}

impl fmt::Display for MissingDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.name, self.version)
    }
}
