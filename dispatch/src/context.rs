//! The handle hooks use to act on the pipeline while a message is in flight.

use registry::VersionReq;
use schema::Object;
use tracing::warn;

use crate::hook::{Flags, HookHandle};

/// Which peer a message is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    ToClient,
    ToServer,
}

impl Direction {
    /// Routes by message name prefix: `S_` and `I_` go to the client, `C_`
    /// to the server.
    pub fn from_name(name: &str) -> Option<Self> {
        if name.starts_with("S_") || name.starts_with("I_") {
            Some(Self::ToClient)
        } else if name.starts_with("C_") {
            Some(Self::ToServer)
        } else {
            None
        }
    }

    /// Whether a message sent this way is seen as incoming by hooks.
    pub const fn is_incoming(self) -> bool {
        matches!(self, Self::ToClient)
    }
}

#[derive(Debug)]
pub(crate) enum DeferredWrite {
    Parsed {
        direction: Direction,
        name: String,
        version: VersionReq,
        data: Object,
    },
    Raw {
        direction: Direction,
        bytes: Vec<u8>,
    },
}

/// Work requested by hooks, applied once the current call returns.
#[derive(Debug, Default)]
pub(crate) struct Deferred {
    pub(crate) writes: Vec<DeferredWrite>,
    pub(crate) unhooks: Vec<HookHandle>,
}

/// Passed to every hook invocation.
///
/// Writes and unhooks requested here are queued and take effect after the
/// message currently being handled has passed every hook.
#[derive(Debug)]
pub struct HookContext<'a> {
    hook: HookHandle,
    module: Option<&'a str>,
    flags: Flags,
    protocol: u32,
    deferred: &'a mut Deferred,
    max_writes: usize,
}

impl<'a> HookContext<'a> {
    pub(crate) fn new(
        hook: HookHandle,
        module: Option<&'a str>,
        flags: Flags,
        protocol: u32,
        deferred: &'a mut Deferred,
        max_writes: usize,
    ) -> Self {
        Self {
            hook,
            module,
            flags,
            protocol,
            deferred,
            max_writes,
        }
    }

    /// The hook being invoked.
    pub const fn hook(&self) -> HookHandle {
        self.hook
    }

    /// The module that registered the hook, if any.
    pub const fn module(&self) -> Option<&str> {
        self.module
    }

    pub const fn flags(&self) -> Flags {
        self.flags
    }

    pub const fn protocol(&self) -> u32 {
        self.protocol
    }

    fn push(&mut self, write: DeferredWrite) -> bool {
        if self.deferred.writes.len() >= self.max_writes {
            warn!(
                hook = self.hook.id(),
                module = self.module.unwrap_or("<unknown>"),
                limit = self.max_writes,
                "deferred write limit reached, dropping write"
            );
            return false;
        }
        self.deferred.writes.push(write);
        true
    }

    /// Queues a message to be encoded and sent through the pipeline.
    ///
    /// Returns `false` if the per-call write limit has been reached.
    pub fn write(
        &mut self,
        direction: Direction,
        name: &str,
        version: impl Into<VersionReq>,
        data: Object,
    ) -> bool {
        self.push(DeferredWrite::Parsed {
            direction,
            name: name.to_string(),
            version: version.into(),
            data,
        })
    }

    /// Queues pre-encoded bytes to be sent through the pipeline.
    pub fn write_raw(&mut self, direction: Direction, bytes: Vec<u8>) -> bool {
        self.push(DeferredWrite::Raw { direction, bytes })
    }

    /// Removes a hook after the current call.
    pub fn unhook(&mut self, hook: HookHandle) {
        self.deferred.unhooks.push(hook);
    }

    /// Removes the invoked hook after the current call.
    pub fn unhook_self(&mut self) {
        let hook = self.hook;
        self.unhook(hook);
    }
}
