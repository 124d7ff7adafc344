//! Field types and definitions.

use std::fmt;

/// Fixed-width field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Bool,
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    Double,
    Vec3,
    /// Three angles stored as `f32` values in 16-bit angle units.
    Vec3fa,
    Angle,
    SkillId32,
    SkillId,
    Customize,
}

impl Primitive {
    /// All primitives, in definition-file naming order.
    pub const ALL: [Self; 16] = [
        Self::Bool,
        Self::Byte,
        Self::Int16,
        Self::UInt16,
        Self::Int32,
        Self::UInt32,
        Self::Int64,
        Self::UInt64,
        Self::Float,
        Self::Double,
        Self::Vec3,
        Self::Vec3fa,
        Self::Angle,
        Self::SkillId32,
        Self::SkillId,
        Self::Customize,
    ];

    /// Returns the encoded width in bytes.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::Bool | Self::Byte => 1,
            Self::Int16 | Self::UInt16 | Self::Angle => 2,
            Self::Int32 | Self::UInt32 | Self::Float | Self::SkillId32 => 4,
            Self::Int64 | Self::UInt64 | Self::Double | Self::SkillId | Self::Customize => 8,
            Self::Vec3 | Self::Vec3fa => 12,
        }
    }

    /// Returns the definition-file name of the type.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Byte => "byte",
            Self::Int16 => "int16",
            Self::UInt16 => "uint16",
            Self::Int32 => "int32",
            Self::UInt32 => "uint32",
            Self::Int64 => "int64",
            Self::UInt64 => "uint64",
            Self::Float => "float",
            Self::Double => "double",
            Self::Vec3 => "vec3",
            Self::Vec3fa => "vec3fa",
            Self::Angle => "angle",
            Self::SkillId32 => "skillid32",
            Self::SkillId => "skillid",
            Self::Customize => "customize",
        }
    }

    /// Looks up a primitive by its definition-file name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reference header kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderKind {
    /// Element or byte count of the named payload.
    Count,
    /// Absolute message position of the named payload.
    Offset,
}

impl HeaderKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Offset => "offset",
        }
    }
}

/// The element type of an array.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// A single fixed-width value per element.
    Primitive(Primitive),
    /// A nested level with its own headers.
    Object(Vec<Field>),
}

/// The type of a field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Primitive(Primitive),
    /// Null-terminated UTF-16LE string, addressed by an offset header.
    String,
    /// Raw byte run, addressed by offset and count headers.
    Bytes,
    /// A 16-bit reference header. The field name is the key path of its payload.
    Header(HeaderKind),
    /// Nested fields sharing the headers of the enclosing level.
    Object(Vec<Field>),
    /// Linked chain of elements.
    Array { element: Element, interleaved: bool },
}

impl FieldType {
    /// Array of nested objects.
    #[must_use]
    pub fn array(fields: Vec<Field>) -> Self {
        Self::Array {
            element: Element::Object(fields),
            interleaved: false,
        }
    }

    /// Array of a fixed-width type.
    #[must_use]
    pub const fn array_of(primitive: Primitive) -> Self {
        Self::Array {
            element: Element::Primitive(primitive),
            interleaved: false,
        }
    }

    /// Marks an array as sharing its link chain with adjacent interleaved siblings.
    #[must_use]
    pub fn interleaved(self) -> Self {
        match self {
            Self::Array { element, .. } => Self::Array {
                element,
                interleaved: true,
            },
            other => other,
        }
    }

    #[must_use]
    pub fn object(fields: Vec<Field>) -> Self {
        Self::Object(fields)
    }

    /// Returns `true` for types addressed through reference headers.
    #[must_use]
    pub const fn is_variable(&self) -> bool {
        matches!(self, Self::String | Self::Bytes | Self::Array { .. })
    }

    /// The implicit headers of a variable-length type, in layout order.
    #[must_use]
    pub const fn implicit_headers(&self) -> &'static [HeaderKind] {
        match self {
            Self::Array { .. } => &[HeaderKind::Count, HeaderKind::Offset],
            Self::Bytes => &[HeaderKind::Offset, HeaderKind::Count],
            Self::String => &[HeaderKind::Offset],
            _ => &[],
        }
    }

    /// Short name used in error messages.
    #[must_use]
    pub const fn describe(&self) -> &'static str {
        match self {
            Self::Primitive(p) => p.name(),
            Self::String => "string",
            Self::Bytes => "bytes",
            Self::Header(kind) => kind.name(),
            Self::Object(_) => "object",
            Self::Array { .. } => "array",
        }
    }
}

impl From<Primitive> for FieldType {
    fn from(primitive: Primitive) -> Self {
        Self::Primitive(primitive)
    }
}

/// A named field.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: FieldType,
}

impl Field {
    #[must_use]
    pub fn new(name: impl Into<String>, ty: impl Into<FieldType>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
        }
    }

    #[must_use]
    pub fn header(kind: HeaderKind, key_path: impl Into<String>) -> Self {
        Self::new(key_path, FieldType::Header(kind))
    }

    /// Returns `true` if this is an interleaved array.
    #[must_use]
    pub const fn is_interleaved(&self) -> bool {
        matches!(
            self.ty,
            FieldType::Array {
                interleaved: true,
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_names_roundtrip() {
        for primitive in Primitive::ALL {
            assert_eq!(Primitive::from_name(primitive.name()), Some(primitive));
        }
        assert_eq!(Primitive::from_name("string"), None);
    }

    #[test]
    fn primitive_sizes() {
        assert_eq!(Primitive::Bool.size(), 1);
        assert_eq!(Primitive::Angle.size(), 2);
        assert_eq!(Primitive::SkillId32.size(), 4);
        assert_eq!(Primitive::Customize.size(), 8);
        assert_eq!(Primitive::Vec3fa.size(), 12);
    }

    #[test]
    fn implicit_header_order() {
        assert_eq!(
            FieldType::array_of(Primitive::UInt32).implicit_headers(),
            &[HeaderKind::Count, HeaderKind::Offset]
        );
        assert_eq!(
            FieldType::Bytes.implicit_headers(),
            &[HeaderKind::Offset, HeaderKind::Count]
        );
        assert_eq!(FieldType::String.implicit_headers(), &[HeaderKind::Offset]);
        assert!(FieldType::Primitive(Primitive::Byte).implicit_headers().is_empty());
    }

    #[test]
    fn interleaved_only_affects_arrays() {
        let field = Field::new("a", FieldType::array(vec![]).interleaved());
        assert!(field.is_interleaved());
        assert_eq!(FieldType::String.interleaved(), FieldType::String);
    }
}
