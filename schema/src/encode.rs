//! Message encoding.

use std::collections::HashMap;

use bytestream::{Angle, Customize, SkillId, Slot, Vec3, Writer};

use crate::decode::{chain_len, element_of, round_robin};
use crate::error::{EncodeError, EncodeResult};
use crate::field::{Element, Field, FieldType, HeaderKind, Primitive};
use crate::schema::{join, Schema};
use crate::value::{Object, Value};

impl Schema {
    /// Encodes a complete message with the given opcode.
    ///
    /// Absent fields are written as zero or empty. Absent objects still emit
    /// every descendant so fixed-position siblings stay aligned.
    pub fn encode(&self, opcode: u16, value: &Object) -> EncodeResult<Vec<u8>> {
        let mut encoder = Encoder {
            writer: Writer::with_capacity(64),
        };
        let length = encoder.writer.reserve_u16();
        encoder.writer.write_u16(opcode);

        let mut slots = Slots::default();
        encoder.level(self.fields(), Some(value), "", "", &mut slots)?;
        slots.resolve_remaining(&mut encoder.writer);

        let mut writer = encoder.writer;
        let total = writer.len();
        let Ok(total16) = u16::try_from(total) else {
            writer.resolve(length, 0);
            return Err(EncodeError::MessageTooLarge { length: total });
        };
        writer.resolve(length, total16);
        Ok(writer.finish())
    }
}

/// Header slots reserved but not yet resolved at one level.
#[derive(Default)]
struct Slots {
    count: HashMap<String, Slot>,
    offset: HashMap<String, Slot>,
}

impl Slots {
    fn slots(&mut self, kind: HeaderKind) -> &mut HashMap<String, Slot> {
        match kind {
            HeaderKind::Count => &mut self.count,
            HeaderKind::Offset => &mut self.offset,
        }
    }

    /// Headers whose payload never materialized are zero.
    fn resolve_remaining(self, writer: &mut Writer) {
        for (_, slot) in self.count.into_iter().chain(self.offset) {
            writer.resolve(slot, 0);
        }
    }
}

fn mismatch(path: &str, expected: &'static str, found: &Value) -> EncodeError {
    EncodeError::TypeMismatch {
        path: path.to_string(),
        expected,
        found: found.kind(),
    }
}

fn integer<T>(item: Option<&Value>, path: &str, expected: &'static str) -> EncodeResult<T>
where
    T: TryFrom<i128> + Default,
{
    let Some(value) = item else {
        return Ok(T::default());
    };
    let wide = value
        .as_integer()
        .ok_or_else(|| mismatch(path, expected, value))?;
    T::try_from(wide).map_err(|_| EncodeError::OutOfRange {
        path: path.to_string(),
        expected,
        value: wide,
    })
}

fn float(item: Option<&Value>, path: &str, expected: &'static str) -> EncodeResult<f64> {
    match item {
        None => Ok(0.0),
        Some(value) => value.as_f64().ok_or_else(|| mismatch(path, expected, value)),
    }
}

fn count16(len: usize, path: &str) -> EncodeResult<u16> {
    u16::try_from(len).map_err(|_| EncodeError::CountOverflow {
        path: path.to_string(),
        len,
    })
}

struct Encoder {
    writer: Writer,
}

impl Encoder {
    fn here(&self) -> EncodeResult<u16> {
        self.writer
            .position_u16()
            .map_err(|_| EncodeError::MessageTooLarge {
                length: self.writer.position(),
            })
    }

    fn resolve_here(&mut self, slot: Slot) -> EncodeResult<()> {
        let here = self.here()?;
        self.writer.resolve(slot, here);
        Ok(())
    }

    fn level(
        &mut self,
        fields: &[Field],
        value: Option<&Object>,
        key_base: &str,
        path_base: &str,
        slots: &mut Slots,
    ) -> EncodeResult<()> {
        let mut index = 0;
        while index < fields.len() {
            let field = &fields[index];
            let key = join(key_base, &field.name);
            let path = join(path_base, &field.name);
            let item = value.and_then(|object| object.get(&field.name));
            match &field.ty {
                FieldType::Header(kind) => {
                    let slot = self.writer.reserve_u16();
                    if let Some(stale) = slots.slots(*kind).insert(key, slot) {
                        self.writer.resolve(stale, 0);
                    }
                }
                FieldType::Primitive(primitive) => self.primitive(*primitive, item, &path)?,
                FieldType::String => {
                    let text = match item {
                        None => "",
                        Some(Value::String(text)) => text.as_str(),
                        Some(other) => return Err(mismatch(&path, "string", other)),
                    };
                    if let Some(slot) = slots.count.remove(&key) {
                        let units = count16(text.encode_utf16().count(), &path)?;
                        self.writer.resolve(slot, units);
                    }
                    if let Some(slot) = slots.offset.remove(&key) {
                        self.resolve_here(slot)?;
                    }
                    self.writer.write_string(text);
                }
                FieldType::Bytes => {
                    let data = match item {
                        None => &[][..],
                        Some(Value::Bytes(data)) => data.as_slice(),
                        Some(other) => return Err(mismatch(&path, "bytes", other)),
                    };
                    if let Some(slot) = slots.count.remove(&key) {
                        let len = count16(data.len(), &path)?;
                        self.writer.resolve(slot, len);
                    }
                    // An empty run written last is addressed at the message length.
                    if let Some(slot) = slots.offset.remove(&key) {
                        self.resolve_here(slot)?;
                    }
                    self.writer.write_bytes(data);
                }
                FieldType::Object(inner) => {
                    let object = match item {
                        None => None,
                        Some(Value::Object(object)) => Some(object),
                        Some(other) => return Err(mismatch(&path, "object", other)),
                    };
                    self.level(inner, object, &key, &path, slots)?;
                }
                FieldType::Array { .. } => {
                    let group = &fields[index..index + chain_len(&fields[index..])];
                    self.chain(group, value, key_base, path_base, slots)?;
                    index += group.len();
                    continue;
                }
            }
            index += 1;
        }
        Ok(())
    }

    /// Writes the elements of `group` as one link chain, round-robin.
    fn chain(
        &mut self,
        group: &[Field],
        value: Option<&Object>,
        key_base: &str,
        path_base: &str,
        slots: &mut Slots,
    ) -> EncodeResult<()> {
        let mut lists: Vec<&[Value]> = Vec::with_capacity(group.len());
        let mut paths = Vec::with_capacity(group.len());
        let mut firsts = Vec::with_capacity(group.len());
        for field in group {
            let key = join(key_base, &field.name);
            let path = join(path_base, &field.name);
            let list = match value.and_then(|object| object.get(&field.name)) {
                None => &[][..],
                Some(Value::Array(items)) => items.as_slice(),
                Some(other) => return Err(mismatch(&path, "array", other)),
            };
            // Empty arrays keep their headers reserved; they resolve to zero.
            let mut first = None;
            if !list.is_empty() {
                let len = count16(list.len(), &path)?;
                if let Some(slot) = slots.count.remove(&key) {
                    self.writer.resolve(slot, len);
                }
                first = slots.offset.remove(&key);
            }
            lists.push(list);
            paths.push(path);
            firsts.push(first);
        }

        let counts: Vec<usize> = lists.iter().map(|list| list.len()).collect();
        let mut written = vec![0usize; group.len()];
        let mut link: Option<Slot> = None;
        for array in round_robin(&counts) {
            let here = self.here()?;
            if let Some(slot) = firsts[array].take() {
                self.writer.resolve(slot, here);
            }
            if let Some(previous) = link.take() {
                self.writer.resolve(previous, here);
            }
            self.writer.write_u16(here);
            link = Some(self.writer.reserve_u16());

            let position = written[array];
            let element_path = format!("{}[{position}]", paths[array]);
            let item = &lists[array][position];
            match element_of(&group[array]) {
                Some(Element::Primitive(primitive)) => {
                    self.primitive(*primitive, Some(item), &element_path)?;
                }
                Some(Element::Object(inner)) => {
                    let Value::Object(object) = item else {
                        return Err(mismatch(&element_path, "object", item));
                    };
                    let mut element_slots = Slots::default();
                    self.level(inner, Some(object), "", &element_path, &mut element_slots)?;
                    element_slots.resolve_remaining(&mut self.writer);
                }
                None => {}
            }
            written[array] += 1;
        }
        if let Some(last) = link {
            self.writer.resolve(last, 0);
        }
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn primitive(&mut self, primitive: Primitive, item: Option<&Value>, path: &str) -> EncodeResult<()> {
        let name = primitive.name();
        let w = &mut self.writer;
        match primitive {
            Primitive::Bool => {
                let flag = match item {
                    None => false,
                    Some(Value::Bool(flag)) => *flag,
                    Some(other) => match other.as_integer() {
                        Some(n) => n != 0,
                        None => return Err(mismatch(path, name, other)),
                    },
                };
                w.write_bool(flag);
            }
            Primitive::Byte => w.write_u8(integer(item, path, name)?),
            Primitive::Int16 => w.write_i16(integer(item, path, name)?),
            Primitive::UInt16 => w.write_u16(integer(item, path, name)?),
            Primitive::Int32 => w.write_i32(integer(item, path, name)?),
            Primitive::UInt32 => w.write_u32(integer(item, path, name)?),
            Primitive::Int64 => w.write_i64(integer(item, path, name)?),
            Primitive::UInt64 => w.write_u64(integer(item, path, name)?),
            Primitive::Float => w.write_f32(float(item, path, name)? as f32),
            Primitive::Double => w.write_f64(float(item, path, name)?),
            Primitive::Vec3 | Primitive::Vec3fa => {
                let v = match item {
                    None => Vec3::default(),
                    Some(Value::Vec3(v)) => *v,
                    Some(other) => return Err(mismatch(path, name, other)),
                };
                if primitive == Primitive::Vec3 {
                    w.write_vec3(v);
                } else {
                    w.write_vec3fa(v);
                }
            }
            Primitive::Angle => {
                let angle = match item {
                    Some(Value::Angle(angle)) => *angle,
                    other => Angle::from_radians(float(other, path, name)?),
                };
                w.write_angle(angle);
            }
            Primitive::SkillId | Primitive::SkillId32 => {
                let skill = match item {
                    None => SkillId::default(),
                    Some(Value::SkillId(skill)) => *skill,
                    other => SkillId::player(integer(other, path, name)?),
                };
                if primitive == Primitive::SkillId {
                    w.write_skill_id(skill);
                } else {
                    w.write_skill_id32(skill);
                }
            }
            Primitive::Customize => {
                let look = match item {
                    Some(Value::Customize(look)) => *look,
                    other => Customize::from_raw(integer(other, path, name)?),
                };
                w.write_customize(look);
            }
        }
        Ok(())
    }
}
