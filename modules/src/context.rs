//! The capability handle given to extensions.

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dispatch::{Direction, Dispatch, HookContext, HookHandle, HookKind, HookOptions};
use registry::{Platform, ProtocolRegistry, VersionReq};
use schema::Object;
use tracing::{debug, error, info, warn};

use crate::error::{ModuleError, ModuleResult};
use crate::manager::LoadedModule;
use crate::timer::{Timer, TimerId, Timers};

/// The loaded modules other than the one a context belongs to.
pub(crate) struct Peers<'a> {
    before: &'a mut [LoadedModule],
    after: &'a mut [LoadedModule],
}

impl<'a> Peers<'a> {
    pub(crate) fn new(loaded: &'a mut [LoadedModule]) -> Self {
        Self {
            before: loaded,
            after: Default::default(),
        }
    }

    /// Splits `loaded` into the module at `index` and everyone else.
    pub(crate) fn around(
        loaded: &'a mut [LoadedModule],
        index: usize,
    ) -> Option<(&'a mut LoadedModule, Self)> {
        let (before, rest) = loaded.split_at_mut(index);
        let (module, after) = rest.split_first_mut()?;
        Some((module, Self { before, after }))
    }

    fn find(&mut self, name: &str) -> Option<&mut LoadedModule> {
        self.before
            .iter_mut()
            .chain(self.after.iter_mut())
            .find(|module| module.name == name)
    }

    fn contains(&self, name: &str) -> bool {
        self.before
            .iter()
            .chain(self.after.iter())
            .any(|module| module.name == name)
    }
}

/// What an extension may do while loading, unloading or running a timer.
///
/// Hooks registered here are owned by the module.
pub struct ModuleContext<'a> {
    module: &'a str,
    dispatch: &'a mut Dispatch,
    timers: &'a mut Timers,
    peers: Peers<'a>,
    now: Instant,
}

impl<'a> ModuleContext<'a> {
    pub(crate) fn new(
        module: &'a str,
        dispatch: &'a mut Dispatch,
        timers: &'a mut Timers,
        peers: Peers<'a>,
        now: Instant,
    ) -> Self {
        Self {
            module,
            dispatch,
            timers,
            peers,
            now,
        }
    }

    /// Name of the module this context belongs to.
    pub const fn name(&self) -> &str {
        self.module
    }

    pub fn protocol(&self) -> u32 {
        self.dispatch.protocol()
    }

    pub fn platform(&self) -> Platform {
        self.dispatch.registry().platform()
    }

    pub fn registry(&self) -> &Arc<ProtocolRegistry> {
        self.dispatch.registry()
    }

    /// Time of the current load or timer run.
    pub const fn now(&self) -> Instant {
        self.now
    }

    pub fn hook(
        &mut self,
        target: &str,
        kind: HookKind,
        options: HookOptions,
    ) -> ModuleResult<HookHandle> {
        Ok(self.dispatch.hook(Some(self.module), target, kind, options)?)
    }

    /// Like [`hook`](Self::hook), logging the failure instead of returning it.
    pub fn try_hook(
        &mut self,
        target: &str,
        kind: HookKind,
        options: HookOptions,
    ) -> Option<HookHandle> {
        match self.hook(target, kind, options) {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!(module = self.module, target, error = %err, "hook not registered");
                None
            }
        }
    }

    /// Registers a hook removed after its first invocation.
    pub fn hook_once(
        &mut self,
        target: &str,
        kind: HookKind,
        options: HookOptions,
    ) -> ModuleResult<HookHandle> {
        self.hook(target, kind, options.once())
    }

    /// Removes one of this module's hooks. Hooks of other modules are
    /// not touched.
    pub fn unhook(&mut self, handle: HookHandle) -> bool {
        self.dispatch.unhook_owned(self.module, handle)
    }

    /// Whether another module is currently loaded on this connection.
    pub fn is_loaded(&self, name: &str) -> bool {
        self.peers.contains(&name.to_lowercase())
    }

    /// Reaches the instance of another loaded module.
    ///
    /// Returns `None` if the module is not loaded, does not expose itself
    /// through [`Extension::as_any_mut`](crate::Extension::as_any_mut), or
    /// is not a `T`. Core modules load first, so they are available to
    /// every other module's `load`.
    pub fn require<T: Any>(&mut self, name: &str) -> Option<&mut T> {
        let name = name.to_lowercase();
        let found = self
            .peers
            .find(&name)?
            .instance
            .as_any_mut()
            .and_then(|any| any.downcast_mut::<T>());
        if found.is_none() {
            debug!(module = self.module, required = %name, "required module not available");
        }
        found
    }

    pub fn to_client(
        &mut self,
        name: &str,
        version: impl Into<VersionReq>,
        data: &Object,
    ) -> ModuleResult<bool> {
        Ok(self.dispatch.write(Direction::ToClient, name, version, data)?)
    }

    pub fn to_server(
        &mut self,
        name: &str,
        version: impl Into<VersionReq>,
        data: &Object,
    ) -> ModuleResult<bool> {
        Ok(self.dispatch.write(Direction::ToServer, name, version, data)?)
    }

    /// Sends a message in the direction given by its name prefix.
    pub fn send(
        &mut self,
        name: &str,
        version: impl Into<VersionReq>,
        data: &Object,
    ) -> ModuleResult<bool> {
        let direction = Direction::from_name(name).ok_or_else(|| ModuleError::UnknownDirection {
            name: name.to_string(),
        })?;
        Ok(self.dispatch.write(direction, name, version, data)?)
    }

    /// Like [`send`](Self::send), returning `false` on any failure.
    pub fn try_send(&mut self, name: &str, version: impl Into<VersionReq>, data: &Object) -> bool {
        self.send(name, version, data).unwrap_or(false)
    }

    /// Runs `callback` once after `delay`.
    pub fn set_timeout<F>(&mut self, delay: Duration, callback: F) -> TimerId
    where
        F: FnMut(&mut ModuleContext<'_>) -> anyhow::Result<()> + Send + 'static,
    {
        self.timers.insert(Timer {
            due: self.now + delay,
            interval: None,
            callback: Box::new(callback),
        })
    }

    /// Runs `callback` every `period` until cleared.
    pub fn set_interval<F>(&mut self, period: Duration, callback: F) -> TimerId
    where
        F: FnMut(&mut ModuleContext<'_>) -> anyhow::Result<()> + Send + 'static,
    {
        self.timers.insert(Timer {
            due: self.now + period,
            interval: Some(period),
            callback: Box::new(callback),
        })
    }

    /// Returns `false` if the timer already fired or was cleared.
    pub fn clear_timer(&mut self, id: TimerId) -> bool {
        self.timers.remove(id)
    }

    pub fn clear_all_timers(&mut self) -> usize {
        self.timers.clear()
    }

    pub fn active_timers(&self) -> Vec<TimerId> {
        self.timers.ids()
    }

    pub fn log(&self, message: &str) {
        info!(module = self.module, "{message}");
    }

    pub fn warn(&self, message: &str) {
        warn!(module = self.module, "{message}");
    }

    pub fn error(&self, message: &str) {
        error!(module = self.module, "{message}");
    }
}

/// Hook contexts offer the sending part of the capability set.
pub trait HookContextExt {
    /// Queues a message in the direction given by its name prefix.
    fn send(&mut self, name: &str, version: impl Into<VersionReq>, data: Object) -> bool;
}

impl HookContextExt for HookContext<'_> {
    fn send(&mut self, name: &str, version: impl Into<VersionReq>, data: Object) -> bool {
        match Direction::from_name(name) {
            Some(direction) => self.write(direction, name, version, data),
            None => {
                warn!(
                    module = self.module().unwrap_or("<unknown>"),
                    name, "unknown message direction"
                );
                false
            }
        }
    }
}
