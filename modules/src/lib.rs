//! Extension lifecycle for the tollgate protocol engine.
//!
//! Extensions are compiled into the host and registered in an
//! [`ExtensionCatalog`] under their module name. Each connection gets a
//! [`ModuleManager`] that scans the module directory for `module.json`
//! metadata, drops modules whose dependencies, conflicts or required
//! definitions cannot be satisfied, and loads the rest into the
//! connection's [`Dispatch`](dispatch::Dispatch).
//!
//! # Module directory layout
//!
//! ```text
//! mods/
//!   auto-loot/
//!     module.json    name, category, options, dependencies, conflicts
//!     manifest.json  optional, required definitions under "defs"
//!   _disabled/       skipped
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use dispatch::{Dispatch, HookKind, HookOptions, Verdict};
//! use modules::{Extension, ExtensionCatalog, ModuleContext, ModuleManager};
//! use registry::{OpcodeMap, Platform, ProtocolRegistry};
//!
//! struct DropChat;
//!
//! impl Extension for DropChat {
//!     fn load(&mut self, ctx: &mut ModuleContext<'_>) -> anyhow::Result<()> {
//!         ctx.hook("S_CHAT", HookKind::raw(|_, _, _| Ok(Verdict::Silence)), HookOptions::new())?;
//!         Ok(())
//!     }
//! }
//!
//! let mods = tempfile::tempdir().unwrap();
//! std::fs::create_dir(mods.path().join("drop-chat")).unwrap();
//!
//! let mut registry = ProtocolRegistry::new(Platform::Pc);
//! registry.insert_map(1, OpcodeMap::new().with("S_CHAT", 20));
//! let dispatch = Dispatch::new(Arc::new(registry), 1).unwrap();
//! let catalog = Arc::new(ExtensionCatalog::new().with("drop-chat", || Box::new(DropChat)));
//!
//! let mut manager = ModuleManager::new(dispatch, catalog, mods.path());
//! let report = manager.load_all().unwrap();
//! assert_eq!(report.loaded, ["drop-chat"]);
//! assert!(manager.dispatch_mut().handle(vec![4, 0, 20, 0], true, false).is_dropped());
//! ```

mod config;
mod context;
mod error;
mod extension;
mod info;
mod manager;
mod resolve;
mod timer;

pub use config::{EngineConfig, EngineLimits, DEFAULT_CORE_MODULES};
pub use context::{HookContextExt, ModuleContext};
pub use error::{ExtensionError, ModuleError, ModuleResult};
pub use extension::{Extension, ExtensionCatalog, ExtensionFactory, ExtensionState};
pub use info::{list_modules, load_module_info, Category, LoadOn, ModuleInfo, ModuleOptions};
pub use manager::{discover, Discovery, LoadReport, ModuleManager};
pub use resolve::resolve_constraints;
pub use timer::{TimerFn, TimerId};

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn manager_is_send() {
        assert_send::<ModuleManager>();
        assert_send_sync::<ExtensionCatalog>();
    }
}
