//! Byte cursor reader with bounded operations.

use tracing::warn;

use crate::error::{StreamError, StreamResult};
use crate::types::{Angle, Customize, SkillId, Vec3, INT16_TO_RAD};

/// A little-endian reader over a complete message buffer.
///
/// Every read is bounds-checked against the buffer; malformed input yields
/// [`StreamError::UnexpectedEof`] rather than a panic. The cursor may be moved
/// freely with [`seek`](Self::seek) since offset-addressed payloads live at
/// absolute positions within the message.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Creates a reader positioned at the start of `data`.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Creates a reader positioned at `pos`.
    pub fn at(data: &'a [u8], pos: usize) -> StreamResult<Self> {
        let mut reader = Self::new(data);
        reader.seek(pos)?;
        Ok(reader)
    }

    /// Returns the current cursor position.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Returns the total buffer length.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns the number of bytes left after the cursor.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Returns `true` if there are no more bytes to read.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Returns the underlying buffer.
    #[must_use]
    pub const fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Moves the cursor to an absolute position.
    pub fn seek(&mut self, pos: usize) -> StreamResult<()> {
        if pos > self.data.len() {
            return Err(StreamError::SeekOutOfBounds {
                target: pos,
                len: self.data.len(),
            });
        }
        self.pos = pos;
        Ok(())
    }

    /// Advances the cursor by `n` bytes.
    pub fn skip(&mut self, n: usize) -> StreamResult<()> {
        self.seek(self.pos.saturating_add(n))
    }

    fn take(&mut self, n: usize) -> StreamResult<&'a [u8]> {
        let available = self.remaining();
        if n > available {
            return Err(StreamError::UnexpectedEof {
                position: self.pos,
                requested: n,
                available,
            });
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn take_array<const N: usize>(&mut self) -> StreamResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Reads a boolean byte. Values above 1 are accepted as `true` with a warning.
    pub fn read_bool(&mut self) -> StreamResult<bool> {
        let position = self.pos;
        let value = self.read_u8()?;
        if value > 1 {
            warn!(position, value, "read byte not 0 or 1 for bool");
        }
        Ok(value != 0)
    }

    /// Reads a `u8`.
    pub fn read_u8(&mut self) -> StreamResult<u8> {
        Ok(self.take_array::<1>()?[0])
    }

    /// Reads `n` raw bytes.
    pub fn read_bytes(&mut self, n: usize) -> StreamResult<&'a [u8]> {
        self.take(n)
    }

    /// Reads a `u16` (little-endian).
    pub fn read_u16(&mut self) -> StreamResult<u16> {
        self.take_array().map(u16::from_le_bytes)
    }

    /// Reads an `i16` (little-endian).
    pub fn read_i16(&mut self) -> StreamResult<i16> {
        self.take_array().map(i16::from_le_bytes)
    }

    /// Reads a `u32` (little-endian).
    pub fn read_u32(&mut self) -> StreamResult<u32> {
        self.take_array().map(u32::from_le_bytes)
    }

    /// Reads an `i32` (little-endian).
    pub fn read_i32(&mut self) -> StreamResult<i32> {
        self.take_array().map(i32::from_le_bytes)
    }

    /// Reads a `u64` (little-endian).
    pub fn read_u64(&mut self) -> StreamResult<u64> {
        self.take_array().map(u64::from_le_bytes)
    }

    /// Reads an `i64` (little-endian).
    pub fn read_i64(&mut self) -> StreamResult<i64> {
        self.take_array().map(i64::from_le_bytes)
    }

    /// Reads an IEEE-754 `f32` (little-endian).
    pub fn read_f32(&mut self) -> StreamResult<f32> {
        self.take_array().map(f32::from_le_bytes)
    }

    /// Reads an IEEE-754 `f64` (little-endian).
    pub fn read_f64(&mut self) -> StreamResult<f64> {
        self.take_array().map(f64::from_le_bytes)
    }

    /// Reads three consecutive `f32` values.
    pub fn read_vec3(&mut self) -> StreamResult<Vec3> {
        Ok(Vec3::new(self.read_f32()?, self.read_f32()?, self.read_f32()?))
    }

    /// Reads three `f32` values holding fixed-point angle units, converted to radians.
    #[allow(clippy::cast_possible_truncation)]
    pub fn read_vec3fa(&mut self) -> StreamResult<Vec3> {
        let mut component = || -> StreamResult<f32> {
            Ok((f64::from(self.read_f32()?) * INT16_TO_RAD) as f32)
        };
        let x = component()?;
        let y = component()?;
        let z = component()?;
        Ok(Vec3::new(x, y, z))
    }

    /// Reads a 16-bit fixed-point angle.
    pub fn read_angle(&mut self) -> StreamResult<Angle> {
        self.read_i16().map(Angle::from_raw)
    }

    /// Reads a 64-bit skill identifier.
    pub fn read_skill_id(&mut self) -> StreamResult<SkillId> {
        self.read_u64().map(SkillId::from_raw64)
    }

    /// Reads a 32-bit skill identifier.
    pub fn read_skill_id32(&mut self) -> StreamResult<SkillId> {
        self.read_u32().map(SkillId::from_raw32)
    }

    /// Reads a packed appearance value.
    pub fn read_customize(&mut self) -> StreamResult<Customize> {
        self.read_u64().map(Customize::from_raw)
    }

    /// Reads a null-terminated UTF-16LE string.
    ///
    /// Unpaired surrogates are replaced with U+FFFD.
    pub fn read_string(&mut self) -> StreamResult<String> {
        let mut units = Vec::new();
        loop {
            match self.read_u16()? {
                0 => break,
                unit => units.push(unit),
            }
        }
        Ok(String::from_utf16_lossy(&units))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_reader() {
        let reader = Reader::new(&[]);
        assert!(reader.is_empty());
        assert_eq!(reader.remaining(), 0);
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn read_from_empty_fails() {
        let mut reader = Reader::new(&[]);
        let result = reader.read_u8();
        assert!(matches!(result, Err(StreamError::UnexpectedEof { .. })));
    }

    #[test]
    fn read_u32_little_endian() {
        let mut reader = Reader::new(&[0x78, 0x56, 0x34, 0x12]);
        assert_eq!(reader.read_u32().unwrap(), 0x1234_5678);
        assert!(reader.is_empty());
    }

    #[test]
    fn read_signed_values() {
        let mut reader = Reader::new(&[0xFF, 0xFF, 0xFE, 0xFF, 0xFF, 0xFF]);
        assert_eq!(reader.read_i16().unwrap(), -1);
        assert_eq!(reader.read_i32().unwrap(), -2);
    }

    #[test]
    fn partial_read_reports_available() {
        let mut reader = Reader::new(&[1, 2, 3]);
        let err = reader.read_u32().unwrap_err();
        assert_eq!(
            err,
            StreamError::UnexpectedEof {
                position: 0,
                requested: 4,
                available: 3,
            }
        );
        // A failed read leaves the cursor untouched.
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn seek_beyond_end_fails() {
        let mut reader = Reader::new(&[0; 4]);
        assert!(reader.seek(4).is_ok());
        let err = reader.seek(5).unwrap_err();
        assert!(matches!(err, StreamError::SeekOutOfBounds { target: 5, len: 4 }));
    }

    #[test]
    fn read_bool_accepts_nonstandard_true() {
        let mut reader = Reader::new(&[0, 1, 7]);
        assert!(!reader.read_bool().unwrap());
        assert!(reader.read_bool().unwrap());
        assert!(reader.read_bool().unwrap());
    }

    #[test]
    fn read_string_utf16() {
        let mut reader = Reader::new(&[b'h', 0, b'i', 0, 0, 0, 9]);
        assert_eq!(reader.read_string().unwrap(), "hi");
        assert_eq!(reader.position(), 6);
    }

    #[test]
    fn read_string_without_terminator_fails() {
        let mut reader = Reader::new(&[b'h', 0, b'i']);
        assert!(reader.read_string().is_err());
    }

    #[test]
    fn read_angle_raw() {
        let mut reader = Reader::new(&[0x00, 0x40]);
        assert_eq!(reader.read_angle().unwrap().raw(), 0x4000);
    }

    #[test]
    fn read_bytes_borrows() {
        let data = [1u8, 2, 3, 4];
        let mut reader = Reader::at(&data, 1).unwrap();
        assert_eq!(reader.read_bytes(2).unwrap(), &[2, 3]);
        assert_eq!(reader.remaining(), 1);
    }
}
