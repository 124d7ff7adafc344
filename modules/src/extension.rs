//! The extension contract and the catalog of compiled-in implementations.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::ModuleContext;

/// An extension instance bound to one connection.
///
/// Everything an extension does to the connection goes through the
/// [`ModuleContext`] it is handed. Hooks and timers it registers belong to
/// the module and are removed when it unloads, whether or not `unload` is
/// implemented.
pub trait Extension: Send {
    /// Registers hooks and timers. A failure unloads everything registered
    /// so far.
    fn load(&mut self, ctx: &mut ModuleContext<'_>) -> anyhow::Result<()>;

    fn unload(&mut self, _ctx: &mut ModuleContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Version of the payload produced by [`save_state`](Self::save_state).
    fn state_format(&self) -> u32 {
        1
    }

    /// Captures state to hand to the next instance on hot-reload.
    fn save_state(&mut self) -> anyhow::Result<Option<serde_json::Value>> {
        Ok(None)
    }

    /// Receives the payload saved by the previous instance.
    fn load_state(
        &mut self,
        _ctx: &mut ModuleContext<'_>,
        _payload: serde_json::Value,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Lets other modules reach this instance through
    /// [`ModuleContext::require`]. Return `Some(self)` to opt in.
    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        None
    }
}

/// State handed from an unloading instance to its replacement.
///
/// The manager checks `module` and `format` against the new instance and
/// passes `payload` through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionState {
    pub module: String,
    pub format: u32,
    pub payload: serde_json::Value,
}

/// Creates a fresh extension instance.
pub type ExtensionFactory = dyn Fn() -> Box<dyn Extension> + Send + Sync;

/// Implementations available to module managers, by module name.
#[derive(Default, Clone)]
pub struct ExtensionCatalog {
    factories: HashMap<String, Arc<ExtensionFactory>>,
}

impl ExtensionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the implementation for `name`, replacing any earlier one.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn Extension> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_lowercase(), Arc::new(factory));
    }

    #[must_use]
    pub fn with<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Extension> + Send + Sync + 'static,
    {
        self.register(name, factory);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Instantiates the extension registered for `name`.
    pub fn create(&self, name: &str) -> Option<Box<dyn Extension>> {
        self.factories.get(&name.to_lowercase()).map(|factory| factory())
    }
}

impl fmt::Debug for ExtensionCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ExtensionCatalog").field("modules", &names).finish()
    }
}
