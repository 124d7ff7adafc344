//! Byte cursor writer with reserve/resolve header slots.

use crate::error::{StreamError, StreamResult};
use crate::types::{Angle, Customize, SkillId, Vec3, RAD_TO_INT16};

/// A reserved 16-bit header that must be patched once its value is known.
///
/// Slots are produced by [`Writer::reserve_u16`] and consumed by
/// [`Writer::resolve`]. They are neither `Clone` nor `Copy`, so a slot can be
/// resolved at most once.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a reserved slot must be resolved"]
pub struct Slot {
    position: usize,
}

impl Slot {
    /// Returns the absolute position of the placeholder.
    pub const fn position(&self) -> usize {
        self.position
    }
}

/// A little-endian writer over a growable buffer.
///
/// Writes land at the cursor, overwriting existing bytes and extending the
/// buffer as needed. Call [`finish`](Self::finish) to take the bytes.
#[derive(Debug, Default, Clone)]
pub struct Writer {
    bytes: Vec<u8>,
    pos: usize,
}

impl Writer {
    /// Creates a new empty `Writer`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new `Writer` with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(bytes),
            pos: 0,
        }
    }

    /// Returns the current cursor position.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Returns the current cursor position as a 16-bit offset.
    pub fn position_u16(&self) -> StreamResult<u16> {
        u16::try_from(self.pos).map_err(|_| StreamError::PositionOverflow { position: self.pos })
    }

    /// Returns the number of bytes written.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` if nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns the bytes written so far.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Moves the cursor to an absolute position within the written bytes.
    pub fn seek(&mut self, pos: usize) -> StreamResult<()> {
        if pos > self.bytes.len() {
            return Err(StreamError::SeekOutOfBounds {
                target: pos,
                len: self.bytes.len(),
            });
        }
        self.pos = pos;
        Ok(())
    }

    /// Advances the cursor by `n` bytes, zero-filling past the end.
    pub fn skip(&mut self, n: usize) {
        let target = self.pos + n;
        if target > self.bytes.len() {
            self.bytes.resize(target, 0);
        }
        self.pos = target;
    }

    fn put(&mut self, data: &[u8]) {
        let end = self.pos + data.len();
        if end > self.bytes.len() {
            self.bytes.resize(end, 0);
        }
        self.bytes[self.pos..end].copy_from_slice(data);
        self.pos = end;
    }

    /// Writes a boolean as a single byte.
    pub fn write_bool(&mut self, value: bool) {
        self.put(&[u8::from(value)]);
    }

    /// Writes a `u8`.
    pub fn write_u8(&mut self, value: u8) {
        self.put(&[value]);
    }

    /// Writes raw bytes.
    pub fn write_bytes(&mut self, data: &[u8]) {
        self.put(data);
    }

    /// Writes a `u16` (little-endian).
    pub fn write_u16(&mut self, value: u16) {
        self.put(&value.to_le_bytes());
    }

    /// Writes an `i16` (little-endian).
    pub fn write_i16(&mut self, value: i16) {
        self.put(&value.to_le_bytes());
    }

    /// Writes a `u32` (little-endian).
    pub fn write_u32(&mut self, value: u32) {
        self.put(&value.to_le_bytes());
    }

    /// Writes an `i32` (little-endian).
    pub fn write_i32(&mut self, value: i32) {
        self.put(&value.to_le_bytes());
    }

    /// Writes a `u64` (little-endian).
    pub fn write_u64(&mut self, value: u64) {
        self.put(&value.to_le_bytes());
    }

    /// Writes an `i64` (little-endian).
    pub fn write_i64(&mut self, value: i64) {
        self.put(&value.to_le_bytes());
    }

    /// Writes an IEEE-754 `f32` (little-endian).
    pub fn write_f32(&mut self, value: f32) {
        self.put(&value.to_le_bytes());
    }

    /// Writes an IEEE-754 `f64` (little-endian).
    pub fn write_f64(&mut self, value: f64) {
        self.put(&value.to_le_bytes());
    }

    /// Writes three consecutive `f32` values.
    pub fn write_vec3(&mut self, value: Vec3) {
        self.write_f32(value.x);
        self.write_f32(value.y);
        self.write_f32(value.z);
    }

    /// Writes radians as three `f32` values holding rounded fixed-point units.
    #[allow(clippy::cast_possible_truncation)]
    pub fn write_vec3fa(&mut self, value: Vec3) {
        for component in [value.x, value.y, value.z] {
            let units = (f64::from(component) * RAD_TO_INT16 % 65536.0).round();
            self.write_f32(units as f32);
        }
    }

    /// Writes a 16-bit fixed-point angle.
    pub fn write_angle(&mut self, value: Angle) {
        self.write_i16(value.raw());
    }

    /// Writes a 64-bit skill identifier.
    pub fn write_skill_id(&mut self, value: SkillId) {
        self.write_u64(value.to_raw64());
    }

    /// Writes a 32-bit skill identifier.
    pub fn write_skill_id32(&mut self, value: SkillId) {
        self.write_u32(value.to_raw32());
    }

    /// Writes a packed appearance value.
    pub fn write_customize(&mut self, value: Customize) {
        self.write_u64(value.to_raw());
    }

    /// Writes a null-terminated UTF-16LE string.
    pub fn write_string(&mut self, value: &str) {
        for unit in value.encode_utf16() {
            self.write_u16(unit);
        }
        self.write_u16(0);
    }

    /// Writes a zero placeholder and returns the slot to patch it later.
    pub fn reserve_u16(&mut self) -> Slot {
        let slot = Slot { position: self.pos };
        self.write_u16(0);
        slot
    }

    /// Patches a reserved slot without moving the cursor.
    pub fn resolve(&mut self, slot: Slot, value: u16) {
        let start = slot.position;
        self.bytes[start..start + 2].copy_from_slice(&value.to_le_bytes());
    }

    /// Patches a reserved slot with the current cursor position.
    pub fn resolve_here(&mut self, slot: Slot) -> StreamResult<u16> {
        let here = self.position_u16()?;
        self.resolve(slot, here);
        Ok(here)
    }

    /// Finishes writing and returns the byte buffer.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}
