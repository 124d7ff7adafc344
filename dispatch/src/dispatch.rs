//! The per-connection hook pipeline.

use std::collections::{HashMap, VecDeque};
use std::fmt::Write as _;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use registry::{Access, ProtocolRegistry, RegistryError, VersionReq};
use schema::Object;
use tracing::{debug, error, info, warn};

use crate::context::{Deferred, DeferredWrite, Direction, HookContext};
use crate::error::{DispatchError, DispatchResult};
use crate::event::Event;
use crate::hook::{Flags, HookHandle, HookKind, HookOptions, Verdict};
use crate::limits::DispatchLimits;
use crate::table::{Hook, HookTable};

/// What the transport should do with a handled message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Send these bytes on, original or rewritten.
    Forward(Vec<u8>),
    /// A hook silenced the message.
    Dropped,
}

impl Outcome {
    pub const fn is_dropped(&self) -> bool {
        matches!(self, Self::Dropped)
    }

    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Self::Forward(bytes) => Some(bytes),
            Self::Dropped => None,
        }
    }
}

/// A written message that passed the pipeline and awaits the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub direction: Direction,
    pub bytes: Vec<u8>,
}

/// Hook pipeline bound to one connection and protocol version.
///
/// Every message passes the hooks registered for its opcode plus the
/// wildcard hooks, in ascending `(order, registration)` order. Hooks
/// registered or removed while a message is being handled take effect for
/// the next message.
#[derive(Debug)]
pub struct Dispatch {
    registry: Arc<ProtocolRegistry>,
    protocol: u32,
    table: HookTable,
    limits: DispatchLimits,
    outbox: VecDeque<OutboundMessage>,
    depth: usize,
}

impl Dispatch {
    /// Binds a pipeline to `protocol`, which must have an opcode table.
    pub fn new(registry: Arc<ProtocolRegistry>, protocol: u32) -> DispatchResult<Self> {
        if registry.opcode_map(protocol).is_none() {
            error!(protocol, "unmapped protocol version");
            return Err(RegistryError::UnmappedProtocol { protocol }.into());
        }
        info!(protocol, platform = %registry.platform(), "switching to protocol version");
        Ok(Self {
            registry,
            protocol,
            table: HookTable::default(),
            limits: DispatchLimits::default(),
            outbox: VecDeque::new(),
            depth: 0,
        })
    }

    #[must_use]
    pub fn with_limits(mut self, limits: DispatchLimits) -> Self {
        self.limits = limits;
        self
    }

    pub const fn protocol(&self) -> u32 {
        self.protocol
    }

    pub fn registry(&self) -> &Arc<ProtocolRegistry> {
        &self.registry
    }

    pub const fn limits(&self) -> &DispatchLimits {
        &self.limits
    }

    /// Registers a hook on a message name, or on every message with `"*"`.
    ///
    /// Wildcard hooks must be raw or request the latest version. Named
    /// hooks must be mapped in the active protocol, and parsed ones must
    /// name an existing definition version.
    pub fn hook(
        &mut self,
        module: Option<&str>,
        target: &str,
        kind: HookKind,
        options: HookOptions,
    ) -> DispatchResult<HookHandle> {
        let key = if target == "*" {
            if let HookKind::Parsed {
                version: VersionReq::Exact(version),
                ..
            } = kind
            {
                return Err(DispatchError::WildcardVersion { version });
            }
            None
        } else {
            let opcode = self
                .registry
                .opcode_map(self.protocol)
                .and_then(|map| map.opcode(target))
                .ok_or_else(|| DispatchError::UnmappedMessage {
                    name: target.to_string(),
                })?;
            if let HookKind::Parsed { version, .. } = &kind {
                self.check_hook_version(target, *version)?;
            }
            Some(opcode)
        };

        let handle = self.table.next_handle();
        debug!(
            hook = handle.id(),
            module = module.unwrap_or("<unknown>"),
            target,
            version = %kind.version_label(),
            order = options.order,
            "hook registered"
        );
        self.table.insert(
            key,
            Hook {
                handle,
                order: options.order,
                owner: module.map(str::to_string),
                target: target.to_string(),
                filter: options.filter,
                once: options.once,
                kind,
            },
        );
        Ok(handle)
    }

    fn check_hook_version(&self, name: &str, version: VersionReq) -> DispatchResult<()> {
        let latest = self.registry.latest_version(name);
        match version {
            VersionReq::Exact(wanted) if self.registry.has_definition(name, wanted) => Ok(()),
            VersionReq::Exact(wanted) if latest.is_some_and(|latest| latest > wanted) => {
                Err(DispatchError::ObsoleteDefinition {
                    name: name.to_string(),
                    version: wanted,
                })
            }
            VersionReq::Latest if latest.is_some() => Ok(()),
            _ => Err(DispatchError::DefinitionNotFound {
                name: name.to_string(),
                version,
            }),
        }
    }

    /// Removes one hook. Returns `false` if it was not registered.
    pub fn unhook(&mut self, handle: HookHandle) -> bool {
        self.table.remove(handle)
    }

    /// Removes a hook on behalf of `module`. Hooks owned by anyone else
    /// are left in place.
    pub fn unhook_owned(&mut self, module: &str, handle: HookHandle) -> bool {
        let removed = self.table.remove_if_owned(handle, module);
        if !removed {
            debug!(module, hook = handle.id(), "hook not removed, not owned by module");
        }
        removed
    }

    /// Removes every hook registered by `module`.
    pub fn unhook_module(&mut self, module: &str) -> usize {
        let removed = self.table.remove_owned_by(module);
        if removed > 0 {
            debug!(module, removed, "module hooks removed");
        }
        removed
    }

    /// Removes all hooks and pending outbound messages.
    pub fn reset(&mut self) {
        self.table.clear();
        self.outbox.clear();
    }

    pub fn hook_count(&self) -> usize {
        self.table.len()
    }

    pub fn module_hook_count(&self, module: &str) -> usize {
        self.table.count_owned_by(module)
    }

    /// Runs a complete message through the hooks.
    ///
    /// `incoming` is true for server to client traffic; `fake` marks
    /// messages produced by [`write`](Self::write).
    pub fn handle(&mut self, mut data: Vec<u8>, incoming: bool, fake: bool) -> Outcome {
        let Ok(opcode) = wire::read_opcode(&data) else {
            warn!(len = data.len(), "message shorter than its header, forwarding untouched");
            return Outcome::Forward(data);
        };
        let schedule = self.table.schedule(opcode);
        if schedule.is_empty() {
            return Outcome::Forward(data);
        }

        let mut flags = Flags {
            fake,
            incoming,
            modified: false,
            silenced: false,
        };
        let mut cache: HashMap<u32, Option<Object>> = HashMap::new();
        let mut deferred = Deferred::default();
        let mut finished = Vec::new();

        for (key, handle) in schedule {
            let Some(hook) = self.table.get_mut(key, handle) else {
                continue;
            };
            if !hook.filter.matches(&flags) {
                continue;
            }
            let Hook {
                owner,
                target,
                kind,
                once,
                ..
            } = hook;
            let module = owner.as_deref();

            match kind {
                HookKind::Raw(callback) => {
                    let before = data.clone();
                    let mut ctx = HookContext::new(
                        handle,
                        module,
                        flags,
                        self.protocol,
                        &mut deferred,
                        self.limits.max_deferred_writes,
                    );
                    match guard(|| callback(opcode, &mut data, &mut ctx)) {
                        Ok(verdict) => {
                            if data != before {
                                flags.modified = true;
                                // Parsed views of the old bytes are stale.
                                cache.clear();
                            }
                            match verdict {
                                Verdict::Accept => flags.silenced = false,
                                Verdict::Silence => flags.silenced = true,
                                Verdict::Pass => {}
                            }
                        }
                        Err(err) => {
                            error!(
                                hook = handle.id(),
                                module = module.unwrap_or("<unknown>"),
                                target = target.as_str(),
                                opcode,
                                data = %hex(&before),
                                error = %format!("{err:#}"),
                                "error running raw hook"
                            );
                            data = before;
                        }
                    }
                }
                HookKind::Parsed { version, callback } => {
                    let resolved = match self.registry.resolve(self.protocol, opcode, *version) {
                        Ok(resolved) => resolved,
                        Err(err) => {
                            error!(
                                hook = handle.id(),
                                module = module.unwrap_or("<unknown>"),
                                opcode,
                                error = %err,
                                "failed to resolve hooked message"
                            );
                            continue;
                        }
                    };
                    let parsed = cache.entry(resolved.version).or_insert_with(|| {
                        let decoded = resolved
                            .ensure(Access::Read, self.protocol)
                            .and_then(|()| resolved.decode(&data));
                        match decoded {
                            Ok(value) => Some(value),
                            Err(err) => {
                                error!(
                                    hook = handle.id(),
                                    module = module.unwrap_or("<unknown>"),
                                    message = %format!("{}<{}>", resolved.name, resolved.version),
                                    data = %hex(&data),
                                    error = %error_chain(&err),
                                    "failed to parse message"
                                );
                                None
                            }
                        }
                    });
                    let Some(parsed) = parsed.as_ref() else {
                        continue;
                    };

                    let mut event = Event::new(&resolved.name, resolved.version, parsed, flags);
                    let mut ctx = HookContext::new(
                        handle,
                        module,
                        flags,
                        self.protocol,
                        &mut deferred,
                        self.limits.max_deferred_writes,
                    );
                    match guard(|| callback(&mut event, &mut ctx)) {
                        Ok(Verdict::Accept) => {
                            flags.modified = true;
                            flags.silenced = false;
                            let edited = event.into_data();
                            match resolved.encode(&edited) {
                                Ok(bytes) => {
                                    data = bytes;
                                    cache.clear();
                                }
                                Err(err) => error!(
                                    hook = handle.id(),
                                    module = module.unwrap_or("<unknown>"),
                                    message = %format!("{}<{}>", resolved.name, resolved.version),
                                    error = %error_chain(&err),
                                    "failed to generate message"
                                ),
                            }
                        }
                        Ok(Verdict::Silence) => flags.silenced = true,
                        Ok(Verdict::Pass) => {}
                        Err(err) => error!(
                            hook = handle.id(),
                            module = module.unwrap_or("<unknown>"),
                            message = %format!("{}<{}>", resolved.name, resolved.version),
                            error = %format!("{err:#}"),
                            "error running hook"
                        ),
                    }
                }
            }

            if *once {
                finished.push(handle);
            }
        }

        for handle in finished.into_iter().chain(deferred.unhooks.drain(..)) {
            self.table.remove(handle);
        }
        let outcome = if flags.silenced {
            Outcome::Dropped
        } else {
            Outcome::Forward(data)
        };
        self.flush(deferred.writes);
        outcome
    }

    fn flush(&mut self, writes: Vec<DeferredWrite>) {
        if writes.is_empty() {
            return;
        }
        if self.depth >= self.limits.max_write_depth {
            warn!(
                dropped = writes.len(),
                depth = self.depth,
                "write nesting limit reached, dropping writes"
            );
            return;
        }
        self.depth += 1;
        for write in writes {
            match write {
                DeferredWrite::Parsed {
                    direction,
                    name,
                    version,
                    data,
                } => {
                    if let Err(err) = self.write(direction, &name, version, &data) {
                        error!(name, error = %error_chain(&err), "deferred write failed");
                    }
                }
                DeferredWrite::Raw { direction, bytes } => {
                    self.write_raw(direction, bytes);
                }
            }
        }
        self.depth -= 1;
    }

    /// Encodes a message and passes it through the hooks as fake traffic.
    ///
    /// Returns `Ok(false)` if a hook silenced it; otherwise the bytes are
    /// queued for [`drain_outbox`](Self::drain_outbox).
    pub fn write(
        &mut self,
        direction: Direction,
        name: &str,
        version: impl Into<VersionReq>,
        data: &Object,
    ) -> DispatchResult<bool> {
        let resolved = self.registry.resolve(self.protocol, name, version)?;
        if !resolved.is_latest() {
            debug!(
                name,
                version = resolved.version,
                latest = resolved.latest_version,
                "writing message that is not the latest version"
            );
        }
        resolved.ensure(Access::Write, self.protocol)?;
        let bytes = resolved.encode(data)?;
        Ok(self.write_raw(direction, bytes))
    }

    /// Passes pre-encoded bytes through the hooks as fake traffic.
    pub fn write_raw(&mut self, direction: Direction, bytes: Vec<u8>) -> bool {
        match self.handle(bytes, direction.is_incoming(), true) {
            Outcome::Forward(bytes) => {
                self.outbox.push_back(OutboundMessage { direction, bytes });
                true
            }
            Outcome::Dropped => false,
        }
    }

    pub fn pending_outbound(&self) -> usize {
        self.outbox.len()
    }

    /// Takes every written message in write order.
    pub fn drain_outbox(&mut self) -> Vec<OutboundMessage> {
        self.outbox.drain(..).collect()
    }

    /// Looks up a required definition set; see
    /// [`ProtocolRegistry::check_definitions`].
    pub fn check_definitions(
        &self,
        defs: &std::collections::BTreeMap<String, registry::DefVersions>,
    ) -> Vec<registry::MissingDef> {
        self.registry.check_definitions(defs)
    }
}

fn guard<T>(f: impl FnOnce() -> anyhow::Result<T>) -> anyhow::Result<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(anyhow::anyhow!("hook panicked: {message}"))
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let _ = write!(out, ": {cause}");
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_formats_bytes() {
        assert_eq!(hex(&[0x04, 0x00, 0xab, 0xff]), "0400abff");
    }

    #[test]
    fn guard_turns_panics_into_errors() {
        let result: anyhow::Result<()> = guard(|| panic!("boom"));
        assert_eq!(result.unwrap_err().to_string(), "hook panicked: boom");
    }

    #[test]
    fn error_chain_includes_sources() {
        let err = RegistryError::Decode {
            name: "S_TEST".to_string(),
            version: 1,
            source: schema::DecodeError::MessageTooSmall { actual: 2 },
        };
        assert_eq!(
            error_chain(&err),
            "failed to decode S_TEST<1>: message too small: 2 bytes"
        );
    }

    #[test]
    fn outcome_helpers() {
        assert!(Outcome::Dropped.is_dropped());
        assert_eq!(Outcome::Forward(vec![1]).into_bytes(), Some(vec![1]));
        assert_eq!(Outcome::Dropped.into_bytes(), None);
    }
}
