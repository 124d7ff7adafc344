//! Versioned message registry for the tollgate protocol engine.
//!
//! A [`ProtocolRegistry`] holds one opcode table per protocol version and
//! every definition version of every message for a single [`Platform`]. It
//! resolves a message name or opcode plus a version selector to a compiled
//! [`Schema`](schema::Schema), and enforces deprecation ranges on reads and
//! writes.
//!
//! # Data directory layout
//!
//! ```text
//! map/protocol.<ver>.map               opcode table per protocol version
//! map_base/protocol.<ver>.map          optional overlay applied on top
//! protocol/<Name>.<ver>.def            platform-independent definition
//! protocol/<Name>.<ver>.<platform>.def platform override
//! manifest.json                        optional deprecation ranges and builds
//! ```
//!
//! # Example
//!
//! ```
//! use registry::{OpcodeMap, Platform, ProtocolRegistry, VersionReq};
//! use schema::{parse_def, Object};
//!
//! let mut registry = ProtocolRegistry::new(Platform::Pc);
//! registry.insert_map(376_012, OpcodeMap::new().with("S_PING", 19_913));
//! registry.insert_definition("S_PING", 1, parse_def("uint32 seq\n", "S_PING.1.def").schema);
//!
//! let ping = Object::new().with("seq", 7u32);
//! let bytes = registry.write(376_012, "S_PING", VersionReq::Latest, &ping).unwrap();
//! assert_eq!(registry.parse(376_012, 19_913u16, 1, &bytes).unwrap(), ping);
//! ```

mod error;
mod manifest;
mod map;
mod platform;
mod registry;
mod version;

pub use error::{Access, RegistryError, RegistryResult};
pub use manifest::{Build, Deprecation, Manifest};
pub use map::{parse_map, parse_map_file, OpcodeMap};
pub use platform::Platform;
pub use registry::{ProtocolRegistry, Resolved};
pub use version::{DefVersion, DefVersions, Identifier, MissingDef, VersionReq};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_api_exports() {
        let _ = ProtocolRegistry::new(Platform::default());
        let _ = OpcodeMap::new();
        let _ = Manifest::default();
        let _ = VersionReq::Latest;
        let _ = Identifier::Opcode(0);

        let _: RegistryResult<()> = Ok(());
    }

    #[test]
    fn registry_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ProtocolRegistry>();
    }
}
