//! Hook descriptors: filters, options, verdicts and callbacks.

use std::fmt;

use registry::VersionReq;

use crate::context::HookContext;
use crate::event::Event;

/// State of the message being handled, as seen by each hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags {
    /// The message was produced by a write, not received from a peer.
    pub fake: bool,
    /// The message travels from the server to the client.
    pub incoming: bool,
    /// An earlier hook changed the message bytes.
    pub modified: bool,
    /// An earlier hook asked for the message to be dropped.
    pub silenced: bool,
}

/// Which message states a hook runs for. `None` matches either value.
///
/// The default skips fake and silenced messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookFilter {
    pub fake: Option<bool>,
    pub incoming: Option<bool>,
    pub modified: Option<bool>,
    pub silenced: Option<bool>,
}

impl Default for HookFilter {
    fn default() -> Self {
        Self {
            fake: Some(false),
            incoming: None,
            modified: None,
            silenced: Some(false),
        }
    }
}

impl HookFilter {
    /// A filter that matches every message.
    #[must_use]
    pub const fn any() -> Self {
        Self {
            fake: None,
            incoming: None,
            modified: None,
            silenced: None,
        }
    }

    pub fn matches(&self, flags: &Flags) -> bool {
        fn check(want: Option<bool>, have: bool) -> bool {
            want.map_or(true, |want| want == have)
        }
        check(self.fake, flags.fake)
            && check(self.incoming, flags.incoming)
            && check(self.modified, flags.modified)
            && check(self.silenced, flags.silenced)
    }
}

/// Registration options for a hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HookOptions {
    /// Lower orders run first; equal orders run in registration order.
    pub order: i32,
    pub filter: HookFilter,
    /// Remove the hook after its first invocation.
    pub once: bool,
}

impl HookOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    #[must_use]
    pub const fn with_filter(mut self, filter: HookFilter) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub const fn once(mut self) -> Self {
        self.once = true;
        self
    }
}

/// Identifies a registered hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HookHandle(pub(crate) u64);

impl HookHandle {
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HookHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a hook decided about the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verdict {
    /// Leave the flags unchanged.
    #[default]
    Pass,
    /// Keep the message. Parsed hooks also commit their edits.
    Accept,
    /// Drop the message unless a later hook accepts it.
    Silence,
}

impl From<bool> for Verdict {
    fn from(keep: bool) -> Self {
        if keep {
            Self::Accept
        } else {
            Self::Silence
        }
    }
}

/// Callback of a raw hook: opcode and the message bytes, editable in place.
pub type RawHookFn =
    dyn FnMut(u16, &mut Vec<u8>, &mut HookContext<'_>) -> anyhow::Result<Verdict> + Send;

/// Callback of a parsed hook.
pub type ParsedHookFn =
    dyn FnMut(&mut Event<'_>, &mut HookContext<'_>) -> anyhow::Result<Verdict> + Send;

/// A hook callback and the message representation it receives.
pub enum HookKind {
    Raw(Box<RawHookFn>),
    Parsed {
        version: VersionReq,
        callback: Box<ParsedHookFn>,
    },
}

impl HookKind {
    pub fn raw<F>(callback: F) -> Self
    where
        F: FnMut(u16, &mut Vec<u8>, &mut HookContext<'_>) -> anyhow::Result<Verdict>
            + Send
            + 'static,
    {
        Self::Raw(Box::new(callback))
    }

    pub fn parsed<F>(version: impl Into<VersionReq>, callback: F) -> Self
    where
        F: FnMut(&mut Event<'_>, &mut HookContext<'_>) -> anyhow::Result<Verdict> + Send + 'static,
    {
        Self::Parsed {
            version: version.into(),
            callback: Box::new(callback),
        }
    }

    /// `raw`, `*` or the requested version number.
    pub fn version_label(&self) -> String {
        match self {
            Self::Raw(_) => "raw".to_string(),
            Self::Parsed { version, .. } => version.to_string(),
        }
    }
}

impl fmt::Debug for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HookKind({})", self.version_label())
    }
}
