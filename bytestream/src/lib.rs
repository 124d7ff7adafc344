//! Little-endian byte cursor primitives for the tollgate protocol engine.
//!
//! This crate provides [`Reader`] and [`Writer`] for the fixed-width and
//! composite field types carried by game messages.
//!
//! # Design Principles
//!
//! - **No unsafe code** - Safety is paramount.
//! - **Bounded reads** - All reads are bounds-checked and return errors, never panic.
//! - **No schema knowledge** - This crate knows nothing about message layouts.
//! - **Resolved headers** - Offset/count headers are reserved as [`Slot`]s and
//!   patched exactly once.
//!
//! # Example
//!
//! ```
//! use bytestream::{Reader, Writer};
//!
//! let mut writer = Writer::new();
//! let slot = writer.reserve_u16();
//! writer.write_string("hi");
//! writer.resolve(slot, 6);
//!
//! let bytes = writer.finish();
//!
//! let mut reader = Reader::new(&bytes);
//! assert_eq!(reader.read_u16().unwrap(), 6);
//! assert_eq!(reader.read_string().unwrap(), "hi");
//! ```

mod error;
mod reader;
mod types;
mod writer;

pub use error::{StreamError, StreamResult};
pub use reader::Reader;
pub use types::{Angle, Customize, SkillId, Vec3, INT16_TO_RAD, RAD_TO_INT16};
pub use writer::{Slot, Writer};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_roundtrip() {
        let writer = Writer::new();
        let bytes = writer.finish();
        assert!(bytes.is_empty());

        let reader = Reader::new(&bytes);
        assert!(reader.is_empty());
    }

    #[test]
    fn composite_roundtrip() {
        let skill = SkillId::player(67_120);
        let look = Customize::from_raw(0x0102_0304_0506_0708);

        let mut writer = Writer::new();
        writer.write_vec3(Vec3::new(1.5, -2.0, 300.25));
        writer.write_angle(Angle::from_raw(-1234));
        writer.write_skill_id(skill);
        writer.write_skill_id32(skill);
        writer.write_customize(look);
        let bytes = writer.finish();
        assert_eq!(bytes.len(), 12 + 2 + 8 + 4 + 8);

        let mut reader = Reader::new(&bytes);
        assert_eq!(reader.read_vec3().unwrap(), Vec3::new(1.5, -2.0, 300.25));
        assert_eq!(reader.read_angle().unwrap(), Angle::from_raw(-1234));
        assert_eq!(reader.read_skill_id().unwrap(), skill);
        assert_eq!(reader.read_skill_id32().unwrap(), skill);
        assert_eq!(reader.read_customize().unwrap(), look);
        assert!(reader.is_empty());
    }

    #[test]
    fn doctest_example() {
        let mut writer = Writer::new();
        let slot = writer.reserve_u16();
        writer.write_string("hi");
        writer.resolve(slot, 6);

        let bytes = writer.finish();

        let mut reader = Reader::new(&bytes);
        assert_eq!(reader.read_u16().unwrap(), 6);
        assert_eq!(reader.read_string().unwrap(), "hi");
    }
}
