//! Hook dispatch for the tollgate protocol engine.
//!
//! A [`Dispatch`] is bound to one connection and protocol version. Modules
//! register hooks on message names (or `"*"` for every message) and every
//! complete message from the transport is passed through
//! [`Dispatch::handle`], which runs the matching hooks in order and reports
//! whether to forward the (possibly rewritten) bytes or drop them.
//!
//! Raw hooks see the bytes; parsed hooks see a decoded [`Event`] for the
//! definition version they asked for. Decoded values are shared between
//! hooks of the same version and only re-encoded when a hook returns
//! [`Verdict::Accept`].
//!
//! Hook failures never escape: errors and panics are logged with the
//! module, hook and message involved, and dispatch moves on to the next
//! hook.

mod context;
mod dispatch;
mod error;
mod event;
mod hook;
mod limits;
mod table;

pub use context::{Direction, HookContext};
pub use dispatch::{Dispatch, OutboundMessage, Outcome};
pub use error::{DispatchError, DispatchResult};
pub use event::Event;
pub use hook::{
    Flags, HookFilter, HookHandle, HookKind, HookOptions, ParsedHookFn, RawHookFn, Verdict,
};
pub use limits::DispatchLimits;
