//! Parser for the line-oriented definition format.
//!
//! ```text
//! # comment
//! uint32 id
//! string name
//! array items
//! - uint16 kind
//! - array<uint32> [interleaved] values
//! ```
//!
//! A line is `[-]* type[<subtype>] [[flag,...]] name`. The dash count is the
//! nesting depth under the last `array` or `object`. The first `count`,
//! `offset`, `refArray`, `refBytes` or `refString` line switches the whole
//! file to explicit headers.

use std::path::Path;

use tracing::{trace, warn};

use crate::error::{ParseReason, SchemaParseError};
use crate::field::{Element, Field, FieldType, HeaderKind, Primitive};
use crate::schema::Schema;

/// A parsed definition and the lines that were skipped.
#[derive(Debug, Clone)]
pub struct ParsedDef {
    pub schema: Schema,
    pub errors: Vec<SchemaParseError>,
}

const HEADER_TYPES: [&str; 5] = ["count", "offset", "refArray", "refBytes", "refString"];

/// Parses definition text. `origin` names the source in diagnostics.
///
/// Malformed lines are logged, collected in [`ParsedDef::errors`] and skipped.
pub fn parse_def(source: &str, origin: &str) -> ParsedDef {
    let mut parser = Parser {
        origin,
        levels: vec![Level::root()],
        depth: 0,
        errors: Vec::new(),
    };
    let mut explicit = false;

    for (index, raw) in source.lines().enumerate() {
        let line_no = index + 1;
        let Some(line) = parse_line(raw) else {
            continue;
        };
        let line = match line {
            Ok(line) => line,
            Err(reason) => {
                parser.reject(line_no, reason);
                continue;
            }
        };
        if !explicit && HEADER_TYPES.contains(&line.type_name) {
            warn!(
                origin,
                line = line_no,
                "\"{}\" encountered, disabling implicit headers",
                line.type_name
            );
            explicit = true;
        }
        parser.push(line_no, &line);
    }

    let fields = parser.finish();
    let errors = parser.errors;
    let schema = Schema::from_fields(fields);
    if let Err(err) = schema.validate() {
        warn!(origin, error = %err, "definition failed validation");
    }
    ParsedDef { schema, errors }
}

/// Reads and parses a definition file.
pub fn parse_def_file(path: &Path) -> std::io::Result<ParsedDef> {
    trace!(path = %path.display(), "reading definition");
    let source = std::fs::read_to_string(path)?;
    Ok(parse_def(&source, &path.display().to_string()))
}

struct Line<'a> {
    depth: usize,
    type_name: &'a str,
    subtype: Option<&'a str>,
    flags: Vec<&'a str>,
    name: &'a str,
}

fn parse_line(raw: &str) -> Option<Result<Line<'_>, ParseReason>> {
    let content = raw.split('#').next().unwrap_or_default().trim();
    if content.is_empty() {
        return None;
    }

    let body = content.trim_start_matches(|c: char| c == '-' || c.is_whitespace());
    let depth = content[..content.len() - body.len()]
        .chars()
        .filter(|&c| c == '-')
        .count();

    let tokens: Vec<&str> = body.split_whitespace().collect();
    let (type_token, flags_token, name) = match tokens.as_slice() {
        [ty, name] => (*ty, None, *name),
        [ty, flags, name] => (*ty, Some(*flags), *name),
        _ => return Some(Err(ParseReason::Malformed)),
    };

    let (type_name, subtype) = match type_token.split_once('<') {
        Some((ty, rest)) => match rest.strip_suffix('>') {
            Some(sub) => (ty, Some(sub)),
            None => return Some(Err(ParseReason::Malformed)),
        },
        None => (type_token, None),
    };

    let flags = match flags_token {
        Some(token) => match token.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .collect(),
            None => return Some(Err(ParseReason::Malformed)),
        },
        None => Vec::new(),
    };

    Some(Ok(Line {
        depth,
        type_name,
        subtype,
        flags,
        name,
    }))
}

enum LevelKind {
    Root,
    Object,
    Array { interleaved: bool },
}

struct Level {
    kind: LevelKind,
    name: String,
    fields: Vec<Field>,
}

impl Level {
    const fn root() -> Self {
        Self {
            kind: LevelKind::Root,
            name: String::new(),
            fields: Vec::new(),
        }
    }

    fn into_field(self) -> Field {
        let ty = match self.kind {
            LevelKind::Array { interleaved } => FieldType::Array {
                element: Element::Object(self.fields),
                interleaved,
            },
            LevelKind::Object | LevelKind::Root => FieldType::Object(self.fields),
        };
        Field::new(self.name, ty)
    }
}

struct Parser<'o> {
    origin: &'o str,
    /// Open levels; `levels[0]` is the root. A level above `depth` is the
    /// last compound field, still open for children.
    levels: Vec<Level>,
    depth: usize,
    errors: Vec<SchemaParseError>,
}

impl Parser<'_> {
    fn reject(&mut self, line: usize, reason: ParseReason) {
        let err = SchemaParseError {
            origin: self.origin.to_string(),
            line,
            reason,
        };
        warn!("parse error: {err}");
        self.errors.push(err);
    }

    fn close_to(&mut self, depth: usize) {
        while self.levels.len() - 1 > depth {
            if let Some(level) = self.levels.pop() {
                let field = level.into_field();
                if let Some(parent) = self.levels.last_mut() {
                    parent.fields.push(field);
                }
            }
        }
    }

    fn push(&mut self, line_no: usize, line: &Line<'_>) {
        let ty = match resolve_type(line) {
            Ok(ty) => ty,
            Err(reason) => {
                self.reject(line_no, reason);
                return;
            }
        };

        if line.depth > self.depth {
            if self.levels.len() - 1 == self.depth {
                self.reject(line_no, ParseReason::NoParentToNest);
                return;
            }
            self.depth += 1;
            if line.depth != self.depth {
                warn!(
                    origin = self.origin,
                    line = line_no,
                    "array nesting too deep"
                );
            }
        } else {
            self.depth = line.depth;
        }
        self.close_to(self.depth);

        match ty {
            LineType::Open(kind) => self.levels.push(Level {
                kind,
                name: line.name.to_string(),
                fields: Vec::new(),
            }),
            LineType::Fields(fields) => {
                if let Some(top) = self.levels.last_mut() {
                    top.fields.extend(fields);
                }
            }
        }
    }

    fn finish(&mut self) -> Vec<Field> {
        self.close_to(0);
        self.levels
            .pop()
            .map(|root| root.fields)
            .unwrap_or_default()
    }
}

enum LineType {
    Open(LevelKind),
    Fields(Vec<Field>),
}

fn resolve_type(line: &Line<'_>) -> Result<LineType, ParseReason> {
    let is_array = line.type_name == "array";
    let mut interleaved = false;
    for flag in &line.flags {
        match *flag {
            "interleaved" if is_array => interleaved = true,
            "interleaved" => {
                return Err(ParseReason::FlagOnNonArray {
                    flag: (*flag).to_string(),
                })
            }
            other => {
                return Err(ParseReason::UnknownFlag {
                    name: other.to_string(),
                })
            }
        }
    }

    if let Some(sub) = line.subtype {
        if !is_array {
            return Err(ParseReason::Malformed);
        }
        let Some(primitive) = Primitive::from_name(sub) else {
            return Err(ParseReason::InvalidSubtype {
                name: sub.to_string(),
            });
        };
        return Ok(LineType::Fields(vec![Field::new(
            line.name,
            FieldType::Array {
                element: Element::Primitive(primitive),
                interleaved,
            },
        )]));
    }

    let name = line.name;
    let header = |kinds: &[HeaderKind]| {
        LineType::Fields(kinds.iter().map(|k| Field::header(*k, name)).collect())
    };
    Ok(match line.type_name {
        "array" => LineType::Open(LevelKind::Array { interleaved }),
        "object" => LineType::Open(LevelKind::Object),
        "string" => LineType::Fields(vec![Field::new(name, FieldType::String)]),
        "bytes" => LineType::Fields(vec![Field::new(name, FieldType::Bytes)]),
        "count" => header(&[HeaderKind::Count]),
        "offset" => header(&[HeaderKind::Offset]),
        "refArray" => header(&[HeaderKind::Count, HeaderKind::Offset]),
        "refBytes" => header(&[HeaderKind::Offset, HeaderKind::Count]),
        "refString" => header(&[HeaderKind::Offset]),
        other => match Primitive::from_name(other) {
            Some(p) => LineType::Fields(vec![Field::new(name, p)]),
            None => {
                return Err(ParseReason::UnknownType {
                    name: other.to_string(),
                })
            }
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> ParsedDef {
        parse_def(source, "test.def")
    }

    fn names(fields: &[Field]) -> Vec<String> {
        fields
            .iter()
            .map(|f| format!("{} {}", f.ty.describe(), f.name))
            .collect()
    }

    fn element_fields(field: &Field) -> &[Field] {
        match &field.ty {
            FieldType::Array {
                element: Element::Object(inner),
                ..
            }
            | FieldType::Object(inner) => inner,
            _ => panic!("not a compound field"),
        }
    }

    #[test]
    fn comments_and_blank_lines_ignored() {
        let parsed = parse("# header\n\nuint32 id # trailing\n   \n");
        assert!(parsed.errors.is_empty());
        assert_eq!(names(parsed.schema.fields()), vec!["uint32 id"]);
    }

    #[test]
    fn implicit_headers_for_nested_arrays() {
        let parsed = parse("uint32 a\narray items\n- string label\n- uint16 b\nbyte c\n");
        assert!(parsed.errors.is_empty());
        let fields = parsed.schema.fields();
        assert_eq!(
            names(fields),
            vec!["count items", "offset items", "uint32 a", "array items", "byte c"]
        );
        assert_eq!(
            names(element_fields(&fields[3])),
            vec!["offset label", "string label", "uint16 b"]
        );
    }

    #[test]
    fn object_fields_share_enclosing_headers() {
        let parsed = parse("object info\n- string title\n- uint32 x\nuint32 y\n");
        let fields = parsed.schema.fields();
        assert_eq!(names(fields), vec!["offset info.title", "object info", "uint32 y"]);
        assert_eq!(names(element_fields(&fields[1])), vec!["string title", "uint32 x"]);
    }

    #[test]
    fn explicit_mode_from_legacy_headers() {
        let parsed = parse("count items\noffset items\narray items\n- uint32 id\n");
        assert!(parsed.errors.is_empty());
        assert_eq!(
            names(parsed.schema.fields()),
            vec!["count items", "offset items", "array items"]
        );
    }

    #[test]
    fn explicit_mode_applies_to_earlier_lines() {
        let parsed = parse("string a\nrefString b\nstring b\n");
        assert_eq!(
            names(parsed.schema.fields()),
            vec!["string a", "offset b", "string b"]
        );
    }

    #[test]
    fn ref_types_normalize() {
        let parsed = parse("refArray a\nrefBytes b\nrefString c\n");
        assert_eq!(
            names(parsed.schema.fields()),
            vec!["count a", "offset a", "offset b", "count b", "offset c"]
        );
    }

    #[test]
    fn array_with_subtype_and_flag() {
        let parsed = parse("array<uint32> [interleaved] ids\narray<skillid> skills\n");
        assert!(parsed.errors.is_empty());
        let fields = parsed.schema.fields();
        assert_eq!(
            fields[4].ty,
            FieldType::Array {
                element: Element::Primitive(Primitive::UInt32),
                interleaved: true,
            }
        );
        assert!(!fields[5].is_interleaved());
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let parsed = parse("uint32\nuint32 a\nwhat x\nuint32 b c d\nbyte z\n");
        assert_eq!(names(parsed.schema.fields()), vec!["uint32 a", "byte z"]);
        let lines: Vec<usize> = parsed.errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![1, 3, 4]);
        assert_eq!(
            parsed.errors[1].reason,
            ParseReason::UnknownType {
                name: "what".to_string()
            }
        );
    }

    #[test]
    fn invalid_flags_and_subtypes() {
        let parsed = parse("uint32 [interleaved] a\narray [sorted] b\narray<string> c\nbyte<x> d\n");
        assert_eq!(parsed.errors.len(), 4);
        assert!(matches!(parsed.errors[0].reason, ParseReason::FlagOnNonArray { .. }));
        assert!(matches!(parsed.errors[1].reason, ParseReason::UnknownFlag { .. }));
        assert!(matches!(parsed.errors[2].reason, ParseReason::InvalidSubtype { .. }));
        assert_eq!(parsed.errors[3].reason, ParseReason::Malformed);
    }

    #[test]
    fn nesting_without_parent_is_rejected() {
        let parsed = parse("uint32 a\n- uint32 b\n");
        assert_eq!(parsed.errors.len(), 1);
        assert_eq!(parsed.errors[0].reason, ParseReason::NoParentToNest);
    }

    #[test]
    fn nesting_too_deep_nests_one_level() {
        let parsed = parse("array a\n--- uint32 b\nuint32 c\n");
        assert!(parsed.errors.is_empty());
        let fields = parsed.schema.fields();
        assert_eq!(names(element_fields(&fields[2])), vec!["uint32 b"]);
        assert_eq!(names(&fields[3..]), vec!["uint32 c"]);
    }

    #[test]
    fn dashes_with_spaces_count_depth() {
        let parsed = parse("array a\n- array b\n- - uint32 c\n- byte d\n");
        let fields = parsed.schema.fields();
        let a = element_fields(&fields[2]);
        assert_eq!(names(a), vec!["count b", "offset b", "array b", "byte d"]);
        assert_eq!(names(element_fields(&a[2])), vec!["uint32 c"]);
    }

    #[test]
    fn display_output_parses_back() {
        let source = "array items\n- string label\n- array<uint16> codes\nobject pos\n- vec3 at\n";
        let first = parse(source).schema;
        let second = parse(&first.to_string()).schema;
        assert_eq!(first, second);
    }
}
