use bytestream::{Angle, Reader, SkillId, Vec3, Writer};

#[test]
fn patched_header_points_at_payload() {
    let mut writer = Writer::new();
    writer.write_u32(0);
    let offset = writer.reserve_u16();
    writer.write_u32(0xDEAD_BEEF);
    let here = writer.resolve_here(offset).unwrap();
    writer.write_string("payload");
    let bytes = writer.finish();

    let mut reader = Reader::at(&bytes, 4).unwrap();
    let pointer = reader.read_u16().unwrap();
    assert_eq!(pointer, here);
    assert_eq!(reader.read_u32().unwrap(), 0xDEAD_BEEF);
    reader.seek(usize::from(pointer)).unwrap();
    assert_eq!(reader.read_string().unwrap(), "payload");
}

#[test]
fn string_with_non_bmp_characters() {
    let mut writer = Writer::new();
    writer.write_string("a\u{1F600}b");
    let bytes = writer.finish();
    // 'a' + surrogate pair + 'b' + terminator
    assert_eq!(bytes.len(), 2 * 5);

    let mut reader = Reader::new(&bytes);
    assert_eq!(reader.read_string().unwrap(), "a\u{1F600}b");
}

#[test]
fn vec3fa_rounds_to_angle_units() {
    let mut writer = Writer::new();
    let half = std::f32::consts::FRAC_PI_2;
    writer.write_vec3fa(Vec3::new(half, 0.0, -half));
    let bytes = writer.finish();

    let mut raw = Reader::new(&bytes);
    assert_eq!(raw.read_f32().unwrap(), 16384.0);
    assert_eq!(raw.read_f32().unwrap(), 0.0);
    assert_eq!(raw.read_f32().unwrap(), -16384.0);

    let mut reader = Reader::new(&bytes);
    let v = reader.read_vec3fa().unwrap();
    assert!((v.x - half).abs() < 1e-4);
    assert!((v.z + half).abs() < 1e-4);
}

#[test]
fn angle_radian_conversion_roundtrip() {
    for raw in [i16::MIN, -1, 0, 1, 12_345, i16::MAX] {
        let angle = Angle::from_raw(raw);
        assert_eq!(Angle::from_radians(angle.radians()), angle);
    }
}

#[test]
fn skill_id_both_widths_share_fields() {
    let skill = SkillId {
        id: 4321,
        hunting_zone_id: 3,
        kind: 1,
        npc: true,
        reserved: 0,
    };
    let mut writer = Writer::new();
    writer.write_skill_id(skill);
    writer.write_skill_id32(skill);
    let bytes = writer.finish();

    let mut reader = Reader::new(&bytes);
    assert_eq!(reader.read_skill_id().unwrap(), skill);
    assert_eq!(reader.read_skill_id32().unwrap(), skill);
}

#[test]
fn truncated_buffer_errors_instead_of_panicking() {
    let mut writer = Writer::new();
    writer.write_u64(7);
    let bytes = writer.finish();

    let mut reader = Reader::new(&bytes[..5]);
    assert!(reader.read_u64().is_err());
    assert_eq!(reader.read_u32().unwrap(), 7);
}
