use std::fs;
use std::path::Path;

use registry::{Platform, ProtocolRegistry, RegistryError, VersionReq};
use schema::{Object, Value};
use tempfile::TempDir;

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn data_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        "map/protocol.376012.map",
        "# opcodes\nS_CHAT 100\nC_CHAT = 101\nS_LOGIN 102\nbroken line here\n",
    );
    write(root, "map/protocol.380000.map", "S_CHAT 200\n");
    write(root, "map/readme.txt", "not a map");
    write(root, "map_base/protocol.376012.map", "S_LOGIN 150\nS_BASE_ONLY 151\n");

    write(root, "protocol/S_CHAT.1.def", "string message\n");
    write(root, "protocol/S_CHAT.2.def", "uint32 channel\nstring message\n");
    write(root, "protocol/S_CHAT.2.console.def", "uint16 channel\nstring message\n");
    write(root, "protocol/S_CHAT.2.classic.def", "byte channel\nstring message\n");
    write(root, "protocol/C_CHAT.1.def", "uint32 channel\nstring message\n");
    write(root, "protocol/S_LOGIN.3.def", "count items\noffset items\narray<uint32> items\n");
    write(root, "protocol/S_UNMAPPED.1.def", "byte b\n");
    write(root, "protocol/bad-name.def", "byte b\n");
    write(root, "protocol/notes.md", "ignored");

    write(
        root,
        "manifest.json",
        r#"{
            "deprecated": { "S_CHAT": { "1": { "writeUntil": 300000, "readUntil": 376012 } } },
            "builds": [
                { "region": "EU", "major": 100, "minor": 2, "protocol": 376012 },
                { "region": "NA", "major": 101, "minor": 1, "protocol": 380000 }
            ]
        }"#,
    );
    dir
}

#[test]
fn loads_maps_with_base_overlay() {
    let dir = data_dir();
    let registry = ProtocolRegistry::load(dir.path(), Platform::Pc).unwrap();

    assert_eq!(registry.protocols(), vec![376_012, 380_000]);
    let map = registry.opcode_map(376_012).unwrap();
    assert_eq!(map.opcode("S_CHAT"), Some(100));
    assert_eq!(map.opcode("C_CHAT"), Some(101));
    assert_eq!(map.opcode("S_LOGIN"), Some(150));
    assert_eq!(map.opcode("S_BASE_ONLY"), Some(151));
    assert_eq!(map.name(102), None);
    assert_eq!(registry.opcode_map(380_000).unwrap().opcode("S_CHAT"), Some(200));
}

#[test]
fn same_name_resolves_per_protocol() {
    let dir = data_dir();
    let registry = ProtocolRegistry::load(dir.path(), Platform::Pc).unwrap();

    let old = registry.resolve(376_012, "S_CHAT", VersionReq::Latest).unwrap();
    let new = registry.resolve(380_000, "S_CHAT", VersionReq::Latest).unwrap();
    assert_eq!(old.opcode, 100);
    assert_eq!(new.opcode, 200);
    assert_eq!(old.version, 2);
}

#[test]
fn platform_override_selected() {
    let dir = data_dir();
    let console = ProtocolRegistry::load(dir.path(), Platform::Console).unwrap();
    let pc = ProtocolRegistry::load(dir.path(), Platform::Pc).unwrap();

    let message = Object::new()
        .with("channel", Value::UInt16(3))
        .with("message", "hi");
    let console_bytes = console.write(376_012, "S_CHAT", 2, &message).unwrap();
    let pc_bytes = pc.write(376_012, "S_CHAT", 2, &message).unwrap();
    // uint16 against uint32 channel
    assert_eq!(pc_bytes.len(), console_bytes.len() + 2);

    let decoded = console.parse(376_012, 100u16, 2, &console_bytes).unwrap();
    assert_eq!(decoded.get("channel"), Some(&Value::UInt16(3)));
}

#[test]
fn invalid_and_foreign_files_ignored() {
    let dir = data_dir();
    let registry = ProtocolRegistry::load(dir.path(), Platform::Pc).unwrap();

    assert_eq!(
        registry.message_names(),
        vec!["C_CHAT", "S_CHAT", "S_LOGIN", "S_UNMAPPED"]
    );
    assert_eq!(registry.versions("S_CHAT").collect::<Vec<_>>(), vec![1, 2]);
}

#[test]
fn manifest_deprecation_and_builds() {
    let dir = data_dir();
    let registry = ProtocolRegistry::load(dir.path(), Platform::Pc).unwrap();

    assert_eq!(registry.protocol_for_build("NA", 101, 1), Some(380_000));
    assert_eq!(registry.protocol_for_build("NA", 101, 2), None);

    let message = Object::new().with("message", "old");
    let err = registry.write(376_012, "S_CHAT", 1, &message).unwrap_err();
    assert!(matches!(err, RegistryError::DeprecatedVersion { .. }));

    let bytes = registry
        .resolve(376_012, "S_CHAT", 1)
        .unwrap()
        .encode(&message)
        .unwrap();
    assert!(registry.parse(376_012, "S_CHAT", 1, &bytes).is_ok());
    assert!(matches!(
        registry.parse(380_000, "S_CHAT", 1, &bytes),
        Err(RegistryError::DeprecatedVersion { .. })
    ));
}

#[test]
fn purge_removes_unreadable_versions() {
    let dir = data_dir();
    let mut registry = ProtocolRegistry::load(dir.path(), Platform::Pc).unwrap();

    assert_eq!(registry.purge_obsolete(380_000), 1);
    assert!(!registry.has_definition("S_CHAT", 1));
    assert!(matches!(
        registry.resolve(380_000, "S_CHAT", 1),
        Err(RegistryError::DefinitionOutdated { .. })
    ));
}

#[test]
fn missing_directories_fail() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "map/protocol.1.map", "S_A 1\n");
    let err = ProtocolRegistry::load(dir.path(), Platform::Pc).unwrap_err();
    assert!(matches!(err, RegistryError::Io { .. }));
}

#[test]
fn malformed_manifest_fails() {
    let dir = data_dir();
    write(dir.path(), "manifest.json", "{ \"builds\": 5 }");
    let err = ProtocolRegistry::load(dir.path(), Platform::Pc).unwrap_err();
    assert!(matches!(err, RegistryError::Manifest { .. }));
}

#[test]
fn reload_picks_up_new_definitions() {
    let dir = data_dir();
    let mut registry = ProtocolRegistry::load(dir.path(), Platform::Pc).unwrap();
    assert_eq!(registry.latest_version("C_CHAT"), Some(1));

    write(dir.path(), "protocol/C_CHAT.2.def", "string message\n");
    registry.reload(dir.path()).unwrap();
    assert_eq!(registry.latest_version("C_CHAT"), Some(2));
}

#[test]
fn counted_array_through_registry() {
    let dir = data_dir();
    let registry = ProtocolRegistry::load(dir.path(), Platform::Pc).unwrap();

    let login = Object::new().with("items", vec![Value::UInt32(7), Value::UInt32(9)]);
    let bytes = registry.write(376_012, "S_LOGIN", VersionReq::Latest, &login).unwrap();
    assert_eq!(u16::from_le_bytes([bytes[2], bytes[3]]), 150);
    assert_eq!(registry.parse(376_012, 150u16, 3, &bytes).unwrap(), login);
}
