//! Composite wire types with fixed bit layouts.

use std::f64::consts::PI;

/// Radians per unit of the 16-bit fixed-point angle.
pub const INT16_TO_RAD: f64 = PI / 32768.0;

/// Fixed-point units per radian.
pub const RAD_TO_INT16: f64 = 32768.0 / PI;

/// A point or direction in world space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    /// Creates a vector from its components.
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another vector.
    #[must_use]
    pub fn dist(&self, other: &Self) -> f32 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// A heading stored as a signed 16-bit fraction of a half turn.
///
/// The raw value is kept so decode followed by encode is exact; conversions
/// to and from radians round to the nearest unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Angle(i16);

impl Angle {
    /// Wraps a raw fixed-point value.
    #[must_use]
    pub const fn from_raw(raw: i16) -> Self {
        Self(raw)
    }

    /// Returns the raw fixed-point value.
    #[must_use]
    pub const fn raw(self) -> i16 {
        self.0
    }

    /// Converts radians to the nearest fixed-point angle, wrapping at a full turn.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_radians(radians: f64) -> Self {
        let units = (radians * RAD_TO_INT16).round() as i64;
        Self(units as i16)
    }

    /// Returns the angle in radians.
    #[must_use]
    pub fn radians(self) -> f64 {
        f64::from(self.0) * INT16_TO_RAD
    }
}

/// Bit-packed skill identifier.
///
/// The hunting zone is only meaningful for NPC skills of type 1; in that case
/// the id is narrowed to 16 bits and the zone occupies the bits above it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct SkillId {
    pub id: u32,
    pub hunting_zone_id: u16,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub kind: u8,
    pub npc: bool,
    pub reserved: u8,
}

impl SkillId {
    /// A player skill (type 1) with the given id.
    #[must_use]
    pub const fn player(id: u32) -> Self {
        Self {
            id,
            hunting_zone_id: 0,
            kind: 1,
            npc: false,
            reserved: 0,
        }
    }

    const fn has_hunting_zone(npc: bool, kind: u8) -> bool {
        npc && kind == 1
    }

    /// Decodes the 64-bit layout.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_raw64(raw: u64) -> Self {
        let kind = ((raw >> 28) & 0xf) as u8;
        let npc = (raw >> 32) & 1 == 1;
        let zone = Self::has_hunting_zone(npc, kind);
        let id_mask = if zone { 0xffff } else { 0x0fff_ffff };
        Self {
            id: (raw & id_mask) as u32,
            hunting_zone_id: if zone { ((raw >> 16) & 0xfff) as u16 } else { 0 },
            kind,
            npc,
            reserved: ((raw >> 33) & 1) as u8,
        }
    }

    /// Encodes the 64-bit layout.
    #[must_use]
    pub const fn to_raw64(self) -> u64 {
        let zone = Self::has_hunting_zone(self.npc, self.kind);
        let id_mask = if zone { 0xffff } else { 0x0fff_ffff };
        let mut raw = self.id as u64 & id_mask;
        if zone {
            raw |= (self.hunting_zone_id as u64 & 0xfff) << 16;
        }
        raw |= (self.kind as u64 & 0xf) << 28;
        raw |= (self.npc as u64) << 32;
        raw |= (self.reserved as u64 & 1) << 33;
        raw
    }

    /// Decodes the 32-bit layout.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_raw32(raw: u32) -> Self {
        let kind = ((raw >> 26) & 0xf) as u8;
        let npc = raw & 0x4000_0000 != 0;
        let zone = Self::has_hunting_zone(npc, kind);
        let id_mask = if zone { 0xffff } else { 0x03ff_ffff };
        Self {
            id: raw & id_mask,
            hunting_zone_id: if zone { ((raw >> 16) & 0x3ff) as u16 } else { 0 },
            kind,
            npc,
            reserved: (raw >> 31) as u8,
        }
    }

    /// Encodes the 32-bit layout.
    #[must_use]
    pub const fn to_raw32(self) -> u32 {
        let zone = Self::has_hunting_zone(self.npc, self.kind);
        let id_mask = if zone { 0xffff } else { 0x03ff_ffff };
        let mut raw = self.id & id_mask;
        if zone {
            raw |= (self.hunting_zone_id as u32 & 0x3ff) << 16;
        }
        raw |= (self.kind as u32 & 0xf) << 26;
        raw |= (self.npc as u32) << 30;
        raw |= (self.reserved as u32 & 1) << 31;
        raw
    }
}

impl std::fmt::Display for SkillId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.reserved != 0 {
            write!(f, "[X{:x}]", self.reserved)?;
        }
        match self.kind {
            1 => f.write_str("A")?,
            2 => f.write_str("R")?,
            other => write!(f, "[T{other}]")?,
        }
        if Self::has_hunting_zone(self.npc, self.kind) {
            write!(f, "{}:", self.hunting_zone_id)?;
        }
        write!(f, "{}", self.id)
    }
}

/// Character appearance packed into eight bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Customize {
    pub unk: u8,
    pub skin_color: u8,
    pub face_style: u8,
    pub face_decal: u8,
    pub hair_style: u8,
    pub hair_color: u8,
    pub voice: u8,
    pub tattoos: u8,
}

impl Customize {
    /// Unpacks the little-endian byte layout.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        let b = raw.to_le_bytes();
        Self {
            unk: b[0],
            skin_color: b[1],
            face_style: b[2],
            face_decal: b[3],
            hair_style: b[4],
            hair_color: b[5],
            voice: b[6],
            tattoos: b[7],
        }
    }

    /// Packs into the little-endian byte layout.
    #[must_use]
    pub const fn to_raw(self) -> u64 {
        u64::from_le_bytes([
            self.unk,
            self.skin_color,
            self.face_style,
            self.face_decal,
            self.hair_style,
            self.hair_color,
            self.voice,
            self.tattoos,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn angle_quarter_turn() {
        let angle = Angle::from_radians(PI / 2.0);
        assert_eq!(angle.raw(), 16384);
        assert!((angle.radians() - PI / 2.0).abs() < 1e-9);
    }

    #[test]
    fn angle_wraps_at_half_turn() {
        assert_eq!(Angle::from_radians(PI).raw(), i16::MIN);
        assert_eq!(Angle::from_radians(-PI).raw(), i16::MIN);
    }

    #[test]
    fn skill_id_player_64() {
        let skill = SkillId::player(110_100);
        let raw = skill.to_raw64();
        assert_eq!(raw, 110_100 | (1 << 28));
        assert_eq!(SkillId::from_raw64(raw), skill);
    }

    #[test]
    fn skill_id_npc_hunting_zone_64() {
        let skill = SkillId {
            id: 1101,
            hunting_zone_id: 434,
            kind: 1,
            npc: true,
            reserved: 0,
        };
        let raw = skill.to_raw64();
        assert_eq!(raw & 0xffff, 1101);
        assert_eq!((raw >> 16) & 0xfff, 434);
        assert_eq!((raw >> 32) & 1, 1);
        assert_eq!(SkillId::from_raw64(raw), skill);
    }

    #[test]
    fn skill_id_npc_hunting_zone_32() {
        let skill = SkillId {
            id: 2002,
            hunting_zone_id: 1000,
            kind: 1,
            npc: true,
            reserved: 1,
        };
        let raw = skill.to_raw32();
        assert_eq!(raw & 0xffff, 2002);
        assert_eq!((raw >> 16) & 0x3ff, 1000);
        assert_eq!(raw >> 31, 1);
        assert_eq!(SkillId::from_raw32(raw), skill);
    }

    #[test]
    fn skill_id_non_zone_ignores_zone_field() {
        let skill = SkillId {
            id: 0x00ab_cdef,
            hunting_zone_id: 99,
            kind: 2,
            npc: true,
            reserved: 0,
        };
        let decoded = SkillId::from_raw64(skill.to_raw64());
        assert_eq!(decoded.hunting_zone_id, 0);
        assert_eq!(decoded.id, 0x00ab_cdef);
    }

    #[test]
    fn skill_id_display() {
        assert_eq!(SkillId::player(42).to_string(), "A42");
        let npc = SkillId {
            id: 7,
            hunting_zone_id: 3,
            kind: 1,
            npc: true,
            reserved: 0,
        };
        assert_eq!(npc.to_string(), "A3:7");
        let odd = SkillId {
            kind: 5,
            ..SkillId::player(1)
        };
        assert_eq!(odd.to_string(), "[T5]1");
    }

    #[test]
    fn customize_byte_order() {
        let raw = 0x0807_0605_0403_0201u64;
        let c = Customize::from_raw(raw);
        assert_eq!(c.unk, 1);
        assert_eq!(c.skin_color, 2);
        assert_eq!(c.tattoos, 8);
        assert_eq!(c.to_raw(), raw);
    }

    #[test]
    fn vec3_distance() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(3.0, 4.0, 0.0);
        assert!((a.dist(&b) - 5.0).abs() < f32::EPSILON);
    }
}
