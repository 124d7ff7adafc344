//! Schema definitions, header placement and validation.

use std::collections::HashSet;
use std::fmt;

use crate::error::{SchemaError, SchemaResult};
use crate::field::{Element, Field, FieldType, HeaderKind};

/// A message layout: an ordered list of fields with reference headers placed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    /// Creates a schema after validation.
    ///
    /// If no field at any depth is a header, implicit headers are inserted
    /// first (see [`SchemaBuilder::build`]).
    pub fn new(fields: Vec<Field>) -> SchemaResult<Self> {
        let schema = Self::from_fields(fields);
        schema.validate()?;
        Ok(schema)
    }

    /// Creates a schema builder.
    #[must_use]
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Places headers without validating.
    pub(crate) fn from_fields(fields: Vec<Field>) -> Self {
        if has_headers(&fields) {
            Self { fields }
        } else {
            Self {
                fields: place_headers(fields),
            }
        }
    }

    /// Returns the top-level fields, headers included.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Validates field names and header targets at every level.
    pub fn validate(&self) -> SchemaResult<()> {
        validate_level(&self.fields, "")
    }
}

/// Builder for [`Schema`].
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    fields: Vec<Field>,
}

impl SchemaBuilder {
    /// Appends a field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, ty: impl Into<FieldType>) -> Self {
        self.fields.push(Field::new(name, ty));
        self
    }

    /// Appends an explicit reference header for the payload at `key_path`.
    #[must_use]
    pub fn header(mut self, kind: HeaderKind, key_path: impl Into<String>) -> Self {
        self.fields.push(Field::header(kind, key_path));
        self
    }

    /// Builds the schema.
    ///
    /// Without any explicit header, the headers of every array, string and
    /// bytes field are placed at the start of the nearest enclosing array
    /// element or message root, keyed by their dotted path through objects.
    pub fn build(self) -> SchemaResult<Schema> {
        Schema::new(self.fields)
    }
}

fn has_headers(fields: &[Field]) -> bool {
    fields.iter().any(|field| match &field.ty {
        FieldType::Header(_) => true,
        FieldType::Object(inner)
        | FieldType::Array {
            element: Element::Object(inner),
            ..
        } => has_headers(inner),
        _ => false,
    })
}

/// Inserts implicit headers into a non-object level and every array element below it.
fn place_headers(fields: Vec<Field>) -> Vec<Field> {
    let mut headers = Vec::new();
    collect_headers(&fields, "", &mut headers);
    headers.extend(fields.into_iter().map(place_in_elements));
    headers
}

fn collect_headers(fields: &[Field], prefix: &str, out: &mut Vec<Field>) {
    for field in fields {
        let key = join(prefix, &field.name);
        if let FieldType::Object(inner) = &field.ty {
            collect_headers(inner, &key, out);
            continue;
        }
        for kind in field.ty.implicit_headers() {
            out.push(Field::header(*kind, key.clone()));
        }
    }
}

fn place_in_elements(field: Field) -> Field {
    let ty = match field.ty {
        FieldType::Object(inner) => {
            FieldType::Object(inner.into_iter().map(place_in_elements).collect())
        }
        FieldType::Array {
            element: Element::Object(inner),
            interleaved,
        } => FieldType::Array {
            element: Element::Object(place_headers(inner)),
            interleaved,
        },
        other => other,
    };
    Field { name: field.name, ty }
}

pub(crate) fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn validate_level(fields: &[Field], path: &str) -> SchemaResult<()> {
    let mut targets = HashSet::new();
    collect_targets(fields, "", &mut targets);
    validate_names(fields, path)?;
    check_headers(fields, "", path, &targets)?;
    Ok(())
}

fn collect_targets(fields: &[Field], prefix: &str, out: &mut HashSet<String>) {
    for field in fields {
        let key = join(prefix, &field.name);
        match &field.ty {
            FieldType::Object(inner) => collect_targets(inner, &key, out),
            ty if ty.is_variable() => {
                out.insert(key);
            }
            _ => {}
        }
    }
}

fn validate_names(fields: &[Field], path: &str) -> SchemaResult<()> {
    let mut seen = HashSet::new();
    for field in fields {
        if matches!(field.ty, FieldType::Header(_)) {
            continue;
        }
        let full = join(path, &field.name);
        if field.name.is_empty() || field.name.contains('.') {
            return Err(SchemaError::InvalidName { name: full });
        }
        if !seen.insert(field.name.as_str()) {
            return Err(SchemaError::DuplicateField { path: full });
        }
        match &field.ty {
            FieldType::Object(inner) => validate_names(inner, &full)?,
            FieldType::Array {
                element: Element::Object(inner),
                ..
            } => validate_level(inner, &full)?,
            _ => {}
        }
    }
    Ok(())
}

fn check_headers(
    fields: &[Field],
    prefix: &str,
    path: &str,
    targets: &HashSet<String>,
) -> SchemaResult<()> {
    for field in fields {
        match &field.ty {
            FieldType::Header(_) => {
                let key = join(prefix, &field.name);
                if !targets.contains(&key) {
                    return Err(SchemaError::UnknownHeaderTarget {
                        path: join(path, &key),
                    });
                }
            }
            FieldType::Object(inner) => {
                check_headers(inner, &join(prefix, &field.name), path, targets)?;
            }
            _ => {}
        }
    }
    Ok(())
}

/// Formats the schema in the definition-file syntax, headers explicit.
impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_level(f, &self.fields, 0)
    }
}

fn write_level(f: &mut fmt::Formatter<'_>, fields: &[Field], depth: usize) -> fmt::Result {
    let dashes = "-".repeat(depth);
    let indent = if depth == 0 { String::new() } else { format!("{dashes} ") };
    for field in fields {
        match &field.ty {
            FieldType::Primitive(p) => writeln!(f, "{indent}{p} {}", field.name)?,
            FieldType::String | FieldType::Bytes | FieldType::Header(_) => {
                writeln!(f, "{indent}{} {}", field.ty.describe(), field.name)?;
            }
            FieldType::Object(inner) => {
                writeln!(f, "{indent}object {}", field.name)?;
                write_level(f, inner, depth + 1)?;
            }
            FieldType::Array {
                element,
                interleaved,
            } => {
                let flags = if *interleaved { " [interleaved]" } else { "" };
                match element {
                    Element::Primitive(p) => {
                        writeln!(f, "{indent}array<{p}>{flags} {}", field.name)?;
                    }
                    Element::Object(inner) => {
                        writeln!(f, "{indent}array{flags} {}", field.name)?;
                        write_level(f, inner, depth + 1)?;
                    }
                }
            }
        }
    }
    Ok(())
}
