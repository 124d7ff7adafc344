//! Configurable limits for work queued from inside hooks.

/// Dispatch-level limits.
///
/// Hooks may queue writes while a message is being handled; these writes
/// re-enter the pipeline once the current call returns. The limits bound how
/// much a single call can queue and how deep that re-entry may nest.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DispatchLimits {
    /// Maximum number of writes queued by hooks during one handle call.
    pub max_deferred_writes: usize,

    /// Maximum nesting of writes issued from hooks handling written messages.
    pub max_write_depth: usize,
}

impl Default for DispatchLimits {
    fn default() -> Self {
        Self {
            max_deferred_writes: 64,
            max_write_depth: 8,
        }
    }
}

impl DispatchLimits {
    /// Creates limits suitable for testing with smaller values.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            max_deferred_writes: 4,
            max_write_depth: 2,
        }
    }

    /// Creates limits with no restrictions (use with caution).
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_deferred_writes: usize::MAX,
            max_write_depth: usize::MAX,
        }
    }
}
