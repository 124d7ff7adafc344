//! Configurable limits for bounded frame reassembly.

/// Wire-level limits for frame reassembly.
///
/// These limits are enforced while buffering transport reads so a corrupt or
/// hostile length prefix cannot grow memory without bound.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Limits {
    /// Maximum size of a single frame in bytes.
    pub max_frame_bytes: usize,

    /// Maximum number of complete frames held before the caller drains them.
    pub max_pending_frames: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            // The length prefix is 16 bits wide.
            max_frame_bytes: usize::from(u16::MAX),
            max_pending_frames: 1024,
        }
    }
}

impl Limits {
    /// Creates limits suitable for testing with smaller values.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            max_frame_bytes: 1024,
            max_pending_frames: 16,
        }
    }

    /// Creates limits with no restrictions (use with caution).
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_frame_bytes: usize::MAX,
            max_pending_frames: usize::MAX,
        }
    }
}
