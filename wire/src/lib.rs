//! Message header layout and frame reassembly for the tollgate protocol engine.
//!
//! This crate handles the outermost wire structure: the 4-byte length/opcode
//! header and the reassembly of length-prefixed frames from transport reads.
//! It does not know about message schemas, only the envelope around them.
//!
//! # Design Principles
//!
//! - **Stable envelope** - `[length u16 LE][opcode u16 LE][payload]`, always.
//! - **Bounded buffering** - Declared lengths are validated against limits before buffering.
//! - **No domain knowledge** - This crate handles framing, not game logic.

mod error;
mod frame;
mod header;
mod limits;

pub use error::{DecodeError, EncodeError, LimitKind, WireResult};
pub use frame::FrameBuffer;
pub use header::{
    decode_header, decode_message_header, encode_header, patch_length, read_opcode,
    MessageHeader, HEADER_SIZE, MAX_MESSAGE_LEN, OPCODE_OFFSET,
};
pub use limits::Limits;
