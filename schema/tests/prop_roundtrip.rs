use bytestream::{Angle, Customize, SkillId, Vec3};
use proptest::prelude::*;
use schema::{parse_def, Object, Schema, Value};

const DEF: &str = "\
uint32 id
string name
bool flag
array entries
- int16 score
- string label
- array<byte> tags
- object pos
- - vec3 at
- - angle heading
bytes blob
customize look
array<skillid> [interleaved] left
array<skillid32> [interleaved] right
double ratio
";

fn schema() -> Schema {
    parse_def(DEF, "prop.def").schema
}

fn finite_f32() -> impl Strategy<Value = f32> {
    -1.0e6f32..1.0e6f32
}

fn entry() -> impl Strategy<Value = Value> {
    (
        any::<i16>(),
        "\\PC{0,12}",
        prop::collection::vec(any::<u8>(), 0..4),
        (finite_f32(), finite_f32(), finite_f32()),
        any::<i16>(),
    )
        .prop_map(|(score, label, tags, (x, y, z), heading)| {
            Value::Object(
                Object::new()
                    .with("score", score)
                    .with("label", label)
                    .with("tags", tags.into_iter().map(Value::Byte).collect::<Vec<_>>())
                    .with(
                        "pos",
                        Object::new()
                            .with("at", Vec3::new(x, y, z))
                            .with("heading", Angle::from_raw(heading)),
                    ),
            )
        })
}

fn message() -> impl Strategy<Value = Object> {
    (
        any::<u32>(),
        "\\PC{0,24}",
        any::<bool>(),
        prop::collection::vec(entry(), 0..5),
        prop::collection::vec(any::<u8>(), 0..32),
        any::<u64>(),
        prop::collection::vec(0u64..(1u64 << 34), 0..4),
        prop::collection::vec(any::<u32>(), 0..4),
        -1.0e9f64..1.0e9f64,
    )
        .prop_map(
            |(id, name, flag, entries, blob, look, left, right, ratio)| {
                Object::new()
                    .with("id", id)
                    .with("name", name)
                    .with("flag", flag)
                    .with("entries", entries)
                    .with("blob", blob)
                    .with("look", Customize::from_raw(look))
                    .with(
                        "left",
                        left.into_iter()
                            .map(|raw| Value::SkillId(SkillId::from_raw64(raw)))
                            .collect::<Vec<_>>(),
                    )
                    .with(
                        "right",
                        right
                            .into_iter()
                            .map(|raw| Value::SkillId(SkillId::from_raw32(raw)))
                            .collect::<Vec<_>>(),
                    )
                    .with("ratio", ratio)
            },
        )
}

proptest! {
    #[test]
    fn prop_decode_inverts_encode(message in message()) {
        let schema = schema();
        let bytes = schema.encode(0x1234, &message).unwrap();
        prop_assert_eq!(schema.decode(&bytes).unwrap(), message);
    }

    #[test]
    fn prop_reencode_is_byte_exact(message in message()) {
        let schema = schema();
        let bytes = schema.encode(1, &message).unwrap();
        let again = schema.encode(1, &schema.decode(&bytes).unwrap()).unwrap();
        prop_assert_eq!(again, bytes);
    }

    #[test]
    fn prop_decode_never_panics(data in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = schema().decode(&data);
    }
}
