//! Client platforms with their own definition overrides.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// The client platform a registry loads definitions for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Pc,
    Console,
    Classic,
}

impl Platform {
    pub const ALL: [Self; 3] = [Self::Pc, Self::Console, Self::Classic];

    /// The platform tag used in definition file names.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pc => "pc",
            Self::Console => "console",
            Self::Classic => "classic",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|platform| platform.as_str() == s)
            .ok_or_else(|| RegistryError::InvalidPlatform { name: s.to_string() })
    }
}
