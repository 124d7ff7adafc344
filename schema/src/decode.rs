//! Message decoding.

use std::collections::HashMap;

use bytestream::{Reader, StreamError};
use tracing::warn;
use wire::HEADER_SIZE;

use crate::error::{DecodeError, DecodeResult};
use crate::field::{Element, Field, FieldType, HeaderKind, Primitive};
use crate::schema::{join, Schema};
use crate::value::{Object, Value};

impl Schema {
    /// Decodes a complete message. The body starts after the 4-byte header.
    pub fn decode(&self, message: &[u8]) -> DecodeResult<Object> {
        if message.len() < HEADER_SIZE {
            return Err(DecodeError::MessageTooSmall {
                actual: message.len(),
            });
        }
        let mut decoder = Decoder {
            reader: Reader::new(message),
        };
        decoder.seek(HEADER_SIZE, "")?;
        let mut headers = Headers::default();
        let mut out = Object::with_capacity(self.fields().len());
        decoder.level(self.fields(), "", "", &mut headers, &mut out)?;
        Ok(out)
    }
}

/// Header values recorded at one array element or message root.
#[derive(Default)]
struct Headers {
    count: HashMap<String, u16>,
    offset: HashMap<String, u16>,
}

impl Headers {
    fn len(&self) -> usize {
        self.count.len() + self.offset.len()
    }
}

struct Decoder<'a> {
    reader: Reader<'a>,
}

fn at(path: &str) -> impl FnOnce(StreamError) -> DecodeError + '_ {
    move |source| DecodeError::Stream {
        path: path.to_string(),
        source,
    }
}

/// The chain order of interleaved elements: one per array per round.
pub(crate) fn round_robin(counts: &[usize]) -> Vec<usize> {
    let rounds = counts.iter().copied().max().unwrap_or(0);
    let mut order = Vec::with_capacity(counts.iter().sum());
    for round in 0..rounds {
        for (array, &count) in counts.iter().enumerate() {
            if count > round {
                order.push(array);
            }
        }
    }
    order
}

/// Length of the run of fields sharing one link chain, starting at `fields[0]`.
pub(crate) fn chain_len(fields: &[Field]) -> usize {
    match fields.first() {
        Some(first) if first.is_interleaved() => {
            fields.iter().take_while(|f| f.is_interleaved()).count()
        }
        _ => 1,
    }
}

pub(crate) fn element_of(field: &Field) -> Option<&Element> {
    match &field.ty {
        FieldType::Array { element, .. } => Some(element),
        _ => None,
    }
}

impl Decoder<'_> {
    fn seek(&mut self, position: usize, path: &str) -> DecodeResult<()> {
        self.reader.seek(position).map_err(at(path))
    }

    fn level(
        &mut self,
        fields: &[Field],
        key_base: &str,
        path_base: &str,
        headers: &mut Headers,
        out: &mut Object,
    ) -> DecodeResult<()> {
        let mut index = 0;
        while index < fields.len() {
            let field = &fields[index];
            let key = join(key_base, &field.name);
            let path = join(path_base, &field.name);
            match &field.ty {
                FieldType::Header(kind) => {
                    let value = self.reader.read_u16().map_err(at(&path))?;
                    match kind {
                        HeaderKind::Count => headers.count.insert(key, value),
                        HeaderKind::Offset => headers.offset.insert(key, value),
                    };
                }
                FieldType::Primitive(primitive) => {
                    let value = self.primitive(*primitive, &path)?;
                    out.insert(field.name.clone(), value);
                }
                FieldType::String => {
                    self.seek_payload(&key, &path, headers)?;
                    let value = self.reader.read_string().map_err(at(&path))?;
                    out.insert(field.name.clone(), value);
                }
                FieldType::Bytes => {
                    let count = headers.count.get(&key).copied().unwrap_or(0);
                    if count > 0 {
                        self.seek_payload(&key, &path, headers)?;
                    }
                    let value = self
                        .reader
                        .read_bytes(usize::from(count))
                        .map_err(at(&path))?;
                    out.insert(field.name.clone(), value.to_vec());
                }
                FieldType::Object(inner) => {
                    let mut object = Object::with_capacity(inner.len());
                    self.level(inner, &key, &path, headers, &mut object)?;
                    out.insert(field.name.clone(), object);
                }
                FieldType::Array { .. } => {
                    let group = &fields[index..index + chain_len(&fields[index..])];
                    let arrays = self.chain(group, key_base, path_base, headers)?;
                    for (field, items) in group.iter().zip(arrays) {
                        out.insert(field.name.clone(), Value::Array(items));
                    }
                    index += group.len();
                    continue;
                }
            }
            index += 1;
        }
        Ok(())
    }

    fn seek_payload(&mut self, key: &str, path: &str, headers: &Headers) -> DecodeResult<()> {
        let Some(&offset) = headers.offset.get(key) else {
            return Ok(());
        };
        let header_end = HEADER_SIZE + 2 * headers.len();
        if usize::from(offset) < header_end {
            return Err(DecodeError::OffsetInsideHeader {
                path: path.to_string(),
                offset,
            });
        }
        let position = self.reader.position();
        if position != usize::from(offset) {
            warn!(path, position, expected = offset, "offset mismatch");
            self.seek(usize::from(offset), path)?;
        }
        Ok(())
    }

    /// Walks one link chain, distributing elements over the arrays of `group`.
    fn chain(
        &mut self,
        group: &[Field],
        key_base: &str,
        path_base: &str,
        headers: &Headers,
    ) -> DecodeResult<Vec<Vec<Value>>> {
        let mut counts = Vec::with_capacity(group.len());
        let mut offsets = Vec::with_capacity(group.len());
        let mut paths = Vec::with_capacity(group.len());
        for field in group {
            let key = join(key_base, &field.name);
            counts.push(headers.count.get(&key).map_or(0, |&c| usize::from(c)));
            offsets.push(headers.offset.get(&key).copied().unwrap_or(0));
            paths.push(join(path_base, &field.name));
        }

        // Each element carries at least its two link fields.
        let bound = self.reader.remaining() / 4;
        let mut items: Vec<Vec<Value>> = counts
            .iter()
            .map(|&count| Vec::with_capacity(count.min(bound)))
            .collect();
        let order = round_robin(&counts);

        let mut next = order.first().map_or(0, |&array| offsets[array]);
        let mut index = 0;
        while next != 0 && index < order.len() {
            let array = order[index];
            let path = &paths[array];
            let target = usize::from(next);
            if items[array].is_empty() && offsets[array] != next {
                warn!(
                    path = %path,
                    position = target,
                    expected = offsets[array],
                    "interleaved array starts away from its offset"
                );
            }
            let position = self.reader.position();
            if position != target {
                warn!(path = %path, position, expected = target, "offset mismatch for array");
                self.seek(target, path)?;
            }

            let here = self.reader.read_u16().map_err(at(path))?;
            if usize::from(here) != target {
                return Err(DecodeError::ElementMismatch {
                    path: path.clone(),
                    position: target,
                    found: here,
                });
            }
            next = self.reader.read_u16().map_err(at(path))?;

            let element_path = format!("{path}[{}]", items[array].len());
            let value = match element_of(&group[array]) {
                Some(Element::Primitive(primitive)) => self.primitive(*primitive, &element_path)?,
                Some(Element::Object(inner)) => {
                    let mut element_headers = Headers::default();
                    let mut object = Object::with_capacity(inner.len());
                    self.level(inner, "", &element_path, &mut element_headers, &mut object)?;
                    Value::Object(object)
                }
                None => Value::Array(Vec::new()),
            };
            items[array].push(value);
            index += 1;

            if next != 0 && index == order.len() {
                return Err(DecodeError::ArrayOverflow {
                    path: path.clone(),
                    index,
                    expected: order.len(),
                });
            }
        }

        if let Some(&array) = order.get(index) {
            return Err(DecodeError::ArrayLengthMismatch {
                path: paths[array].clone(),
                found: items[array].len(),
                expected: counts[array],
            });
        }
        Ok(items)
    }

    fn primitive(&mut self, primitive: Primitive, path: &str) -> DecodeResult<Value> {
        let r = &mut self.reader;
        let value = match primitive {
            Primitive::Bool => r.read_bool().map(Value::Bool),
            Primitive::Byte => r.read_u8().map(Value::Byte),
            Primitive::Int16 => r.read_i16().map(Value::Int16),
            Primitive::UInt16 => r.read_u16().map(Value::UInt16),
            Primitive::Int32 => r.read_i32().map(Value::Int32),
            Primitive::UInt32 => r.read_u32().map(Value::UInt32),
            Primitive::Int64 => r.read_i64().map(Value::Int64),
            Primitive::UInt64 => r.read_u64().map(Value::UInt64),
            Primitive::Float => r.read_f32().map(Value::Float),
            Primitive::Double => r.read_f64().map(Value::Double),
            Primitive::Vec3 => r.read_vec3().map(Value::Vec3),
            Primitive::Vec3fa => r.read_vec3fa().map(Value::Vec3),
            Primitive::Angle => r.read_angle().map(Value::Angle),
            Primitive::SkillId32 => r.read_skill_id32().map(Value::SkillId),
            Primitive::SkillId => r.read_skill_id().map(Value::SkillId),
            Primitive::Customize => r.read_customize().map(Value::Customize),
        };
        value.map_err(at(path))
    }
}
