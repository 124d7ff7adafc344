//! Message schemas and offset-addressed encoding for the tollgate protocol engine.
//!
//! This crate turns message definitions into exact decoders and encoders:
//! - Definition-file parser with implicit and explicit reference headers
//! - Structured schema builder for definitions written in code
//! - Decoder and encoder for linked arrays, strings and byte runs
//! - Dynamic [`Value`] model for decoded messages
//!
//! # Design Principles
//!
//! - **Exact layout** - Encoding a decoded message reproduces its bytes.
//! - **Lenient definitions** - Malformed definition lines are reported and skipped.
//! - **Strict messages** - Malformed messages yield errors, never panics.
//!
//! # Example
//!
//! ```
//! use schema::{parse_def, Object, Value};
//!
//! let def = parse_def("count id\noffset id\narray<uint32> id\n", "S_EXAMPLE.1.def");
//! let message = Object::new().with("id", vec![Value::UInt32(7), Value::UInt32(9)]);
//!
//! let bytes = def.schema.encode(0x4d2, &message).unwrap();
//! assert_eq!(def.schema.decode(&bytes).unwrap(), message);
//! ```

mod decode;
mod encode;
mod error;
mod field;
mod parser;
mod schema;
mod value;

pub use error::{
    DecodeError, DecodeResult, EncodeError, EncodeResult, ParseReason, SchemaError,
    SchemaParseError, SchemaResult,
};
pub use field::{Element, Field, FieldType, HeaderKind, Primitive};
pub use parser::{parse_def, parse_def_file, ParsedDef};
pub use schema::{Schema, SchemaBuilder};
pub use value::{Object, Value};
