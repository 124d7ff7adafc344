//! Loading extensions into one connection's dispatch pipeline.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use dispatch::Dispatch;
use registry::ProtocolRegistry;
use tracing::{debug, error, info, warn};

use crate::config::{EngineConfig, DEFAULT_CORE_MODULES};
use crate::context::{ModuleContext, Peers};
use crate::error::{ModuleError, ModuleResult};
use crate::extension::{Extension, ExtensionCatalog, ExtensionState};
use crate::info::{list_modules, load_module_info, Category, LoadOn, ModuleInfo};
use crate::resolve::resolve_constraints;
use crate::timer::Timers;

/// Result of scanning a module directory.
#[derive(Debug, Default)]
pub struct Discovery {
    /// Modules that passed every check, in directory order.
    pub installed: Vec<ModuleInfo>,
    /// Why the other modules were left out.
    pub excluded: Vec<ModuleError>,
}

/// Reads every module under `root` and drops the ones that cannot run.
///
/// Disabled modules are skipped silently. Unreadable metadata, duplicate
/// names, definitions missing from `registry`, missing dependencies and
/// installed conflicts exclude a module with an error; modules of other
/// categories than [`Category::Network`] are skipped last.
pub fn discover(
    root: &Path,
    registry: Option<&ProtocolRegistry>,
    support_url: Option<&str>,
) -> ModuleResult<Discovery> {
    let mut discovery = Discovery::default();
    for dir_name in list_modules(root)? {
        let info = match load_module_info(root, &dir_name) {
            Ok(info) => info,
            Err(err) => {
                error!(module = %dir_name, error = %error_chain(&err), "unable to load module information");
                discovery.excluded.push(err);
                continue;
            }
        };
        if info.disabled {
            debug!(module = %info.printable_name(), "module disabled");
            continue;
        }
        if discovery.installed.iter().any(|other| other.name == info.name) {
            error!(module = %dir_name, "duplicate module detected");
            discovery
                .excluded
                .push(ModuleError::Duplicate { name: info.name });
            continue;
        }
        if let Some(registry) = registry {
            let missing = registry.check_definitions(&info.defs);
            if !missing.is_empty() {
                for def in &missing {
                    error!(module = %info.printable_name(), def = %def, "module uses outdated or unsupported message");
                }
                error!(
                    module = %info.printable_name(),
                    support = support_hint(&info, support_url),
                    "please contact the module's author"
                );
                discovery.excluded.push(ModuleError::MissingDefinitions {
                    name: info.name,
                    missing,
                });
                continue;
            }
        }
        discovery.installed.push(info);
    }

    let removed = resolve_constraints(&mut discovery.installed);
    discovery.excluded.extend(removed);

    discovery.installed.retain(|info| {
        let keep = info.category == Category::Network;
        if !keep {
            debug!(module = %info.printable_name(), category = ?info.category, "skipping module of another category");
        }
        keep
    });
    Ok(discovery)
}

fn support_hint<'a>(info: &'a ModuleInfo, fallback: Option<&'a str>) -> &'a str {
    info.support_url
        .as_deref()
        .or(fallback)
        .unwrap_or("the module's author")
}

/// Outcome of [`ModuleManager::load_all`].
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Modules loaded by this call, in load order.
    pub loaded: Vec<String>,
    /// Modules left out before loading.
    pub excluded: Vec<ModuleError>,
    /// Modules whose load failed.
    pub failed: Vec<ModuleError>,
}

pub(crate) struct LoadedModule {
    pub(crate) name: String,
    pub(crate) instance: Box<dyn Extension>,
    pub(crate) timers: Timers,
}

/// Installed and loaded extensions of one connection.
///
/// The manager owns the connection's [`Dispatch`]; the transport reaches it
/// through [`dispatch_mut`](Self::dispatch_mut). Dropping the manager
/// unloads every module.
pub struct ModuleManager {
    dispatch: Dispatch,
    catalog: Arc<ExtensionCatalog>,
    root: PathBuf,
    core: Vec<String>,
    support_url: Option<String>,
    installed: Vec<ModuleInfo>,
    loaded: Vec<LoadedModule>,
    now: Instant,
}

impl ModuleManager {
    pub fn new(dispatch: Dispatch, catalog: Arc<ExtensionCatalog>, root: impl Into<PathBuf>) -> Self {
        Self {
            dispatch,
            catalog,
            root: root.into(),
            core: DEFAULT_CORE_MODULES.map(String::from).to_vec(),
            support_url: None,
            installed: Vec::new(),
            loaded: Vec::new(),
            now: Instant::now(),
        }
    }

    /// Uses the module directory, core modules and support URL of `config`.
    pub fn from_config(dispatch: Dispatch, catalog: Arc<ExtensionCatalog>, config: &EngineConfig) -> Self {
        Self::new(dispatch, catalog, &config.module_dir)
            .with_core_modules(config.core_modules.iter().map(String::as_str))
            .with_support_url(config.support_url.clone())
    }

    #[must_use]
    pub fn with_core_modules<'a>(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        self.core = names.into_iter().map(str::to_lowercase).collect();
        self
    }

    #[must_use]
    pub fn with_support_url(mut self, url: Option<String>) -> Self {
        self.support_url = url;
        self
    }

    pub const fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    pub fn dispatch_mut(&mut self) -> &mut Dispatch {
        &mut self.dispatch
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn installed(&self) -> &[ModuleInfo] {
        &self.installed
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.info(name).is_some()
    }

    pub fn info(&self, name: &str) -> Option<&ModuleInfo> {
        let name = name.to_lowercase();
        self.installed.iter().find(|info| info.name == name)
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.loaded.iter().any(|module| module.name == name)
    }

    /// A loaded module's instance, if it exposes itself as a `T`.
    pub fn get<T: Any>(&mut self, name: &str) -> Option<&mut T> {
        let name = name.to_lowercase();
        self.loaded
            .iter_mut()
            .find(|module| module.name == name)?
            .instance
            .as_any_mut()?
            .downcast_mut::<T>()
    }

    pub fn is_core(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.core.contains(&name)
    }

    /// Loaded module names in load order.
    pub fn loaded_names(&self) -> Vec<&str> {
        self.loaded.iter().map(|module| module.name.as_str()).collect()
    }

    /// Rescans the module directory and loads every installed module.
    ///
    /// Modules that load on connect come before those that wait for the
    /// version check; within each group core modules load first. A failing
    /// module is reported and the sequence continues. Fails only if the
    /// directory itself cannot be read.
    pub fn load_all(&mut self) -> ModuleResult<LoadReport> {
        let discovery = discover(
            &self.root,
            Some(self.dispatch.registry().as_ref()),
            self.support_url.as_deref(),
        )?;
        self.installed = discovery.installed;
        let mut report = LoadReport {
            excluded: discovery.excluded,
            ..LoadReport::default()
        };

        for phase in [LoadOn::Connect, LoadOn::VersionCheck] {
            for core in [true, false] {
                let names: Vec<String> = self
                    .installed
                    .iter()
                    .filter(|info| info.options.load_on == phase && self.is_core(&info.name) == core)
                    .map(|info| info.name.clone())
                    .collect();
                for name in names {
                    if self.is_loaded(&name) {
                        continue;
                    }
                    match self.load(&name) {
                        Ok(()) => report.loaded.push(name),
                        Err(err) => report.failed.push(err),
                    }
                }
            }
        }
        Ok(report)
    }

    /// Unloads regular modules, then core modules. Returns how many
    /// unloaded cleanly.
    pub fn unload_all(&mut self) -> usize {
        let (core, regular): (Vec<String>, Vec<String>) = self
            .loaded
            .iter()
            .map(|module| module.name.clone())
            .partition(|name| self.is_core(name));
        regular
            .into_iter()
            .chain(core)
            .filter(|name| self.unload(name).is_ok())
            .count()
    }

    /// Loads an installed module. Loading a loaded module does nothing.
    ///
    /// If the extension fails to load, hooks it registered are removed and
    /// its timers dropped.
    pub fn load(&mut self, name: &str) -> ModuleResult<()> {
        let name = name.to_lowercase();
        if self.is_loaded(&name) {
            return Ok(());
        }
        let Some(info) = self.info(&name) else {
            error!(module = %name, "trying to load module that is not installed");
            return Err(ModuleError::NotInstalled { name });
        };
        let printable = info.printable_name();
        let support = support_hint(info, self.support_url.as_deref()).to_string();

        let Some(mut instance) = self.catalog.create(&name) else {
            error!(module = %printable, "no implementation registered for module");
            return Err(ModuleError::NoImplementation { name });
        };
        let mut timers = Timers::default();
        let result = {
            let peers = Peers::new(&mut self.loaded);
            let mut ctx =
                ModuleContext::new(&name, &mut self.dispatch, &mut timers, peers, self.now);
            guard(|| instance.load(&mut ctx))
        };

        if let Err(source) = result {
            let removed = self.dispatch.unhook_module(&name);
            error!(
                module = %printable,
                removed_hooks = removed,
                error = %format!("{source:#}"),
                "module could not be loaded"
            );
            error!(module = %printable, support = %support, "please contact the module's author");
            return Err(ModuleError::LoadFailed {
                name,
                source: source.into(),
            });
        }

        info!(module = %printable, "loaded module");
        self.loaded.push(LoadedModule {
            name,
            instance,
            timers,
        });
        Ok(())
    }

    /// Unloads a loaded module, removing its hooks and timers.
    ///
    /// The module is removed even if its `unload` fails; the failure is
    /// still reported.
    pub fn unload(&mut self, name: &str) -> ModuleResult<()> {
        let name = name.to_lowercase();
        let Some(info) = self.info(&name) else {
            error!(module = %name, "trying to unload module that is not installed");
            return Err(ModuleError::NotInstalled { name });
        };
        let printable = info.printable_name();
        let support = support_hint(info, self.support_url.as_deref()).to_string();
        let Some(index) = self.loaded.iter().position(|module| module.name == name) else {
            error!(module = %printable, "trying to unload module that is not loaded");
            return Err(ModuleError::NotLoaded { name });
        };

        let mut module = self.loaded.remove(index);
        let result = {
            let peers = Peers::new(&mut self.loaded);
            let mut ctx = ModuleContext::new(
                &module.name,
                &mut self.dispatch,
                &mut module.timers,
                peers,
                self.now,
            );
            guard(|| module.instance.unload(&mut ctx))
        };
        self.dispatch.unhook_module(&name);
        drop(module);

        if let Err(source) = result {
            error!(module = %printable, error = %format!("{source:#}"), "module could not be unloaded");
            error!(module = %printable, support = %support, "please contact the module's author");
            return Err(ModuleError::UnloadFailed {
                name,
                source: source.into(),
            });
        }
        info!(module = %printable, "unloaded module");
        Ok(())
    }

    /// Replaces a reloadable module with a fresh instance, handing over
    /// the state saved by the old one.
    pub fn reload(&mut self, name: &str) -> ModuleResult<()> {
        let name = name.to_lowercase();
        let Some(info) = self.info(&name) else {
            error!(module = %name, "trying to reload module that is not installed");
            return Err(ModuleError::NotInstalled { name });
        };
        let printable = info.printable_name();
        if !info.options.reloadable {
            error!(module = %printable, "trying to reload module that does not support hot-reload");
            return Err(ModuleError::NotReloadable { name });
        }
        if !self.is_loaded(&name) {
            error!(module = %printable, "trying to reload module that is not loaded");
            return Err(ModuleError::NotLoaded { name });
        }

        let state = self.save_state(&name)?;
        if let Err(err) = self.unload(&name).and_then(|()| self.load(&name)) {
            error!(module = %printable, "reload failed");
            return Err(err);
        }
        if let Some(state) = state {
            self.restore_state(&name, state)?;
        }
        info!(module = %printable, "reloaded module");
        Ok(())
    }

    /// Asks a loaded module for its hot-reload state.
    ///
    /// A failing `save_state` is logged and treated as no state.
    pub fn save_state(&mut self, name: &str) -> ModuleResult<Option<ExtensionState>> {
        let name = name.to_lowercase();
        let Some(module) = self.loaded.iter_mut().find(|module| module.name == name) else {
            return Err(ModuleError::NotLoaded { name });
        };
        let format = module.instance.state_format();
        match guard(|| module.instance.save_state()) {
            Ok(payload) => Ok(payload.map(|payload| ExtensionState {
                module: name,
                format,
                payload,
            })),
            Err(err) => {
                warn!(module = %name, error = %format!("{err:#}"), "failed to save module state");
                Ok(None)
            }
        }
    }

    /// Hands saved state to a loaded module after checking its tag and
    /// format.
    pub fn restore_state(&mut self, name: &str, state: ExtensionState) -> ModuleResult<()> {
        let name = name.to_lowercase();
        let Some((module, peers)) = self
            .loaded
            .iter()
            .position(|module| module.name == name)
            .and_then(|index| Peers::around(&mut self.loaded, index))
        else {
            return Err(ModuleError::NotLoaded { name });
        };
        let expected = module.instance.state_format();
        if state.module != name || state.format != expected {
            warn!(
                module = %name,
                state_module = %state.module,
                expected,
                found = state.format,
                "discarding incompatible module state"
            );
            return Err(ModuleError::StateMismatch {
                name,
                expected,
                found: state.format,
            });
        }

        let result = {
            let mut ctx = ModuleContext::new(
                &module.name,
                &mut self.dispatch,
                &mut module.timers,
                peers,
                self.now,
            );
            guard(|| module.instance.load_state(&mut ctx, state.payload))
        };
        result.map_err(|source| {
            error!(module = %name, error = %format!("{source:#}"), "failed to restore module state");
            ModuleError::LoadFailed {
                name,
                source: source.into(),
            }
        })
    }

    /// Runs every timer due at `now`. Returns the number of timers fired.
    ///
    /// Each timer fires at most once per call; timers set while running
    /// wait for the next call.
    pub fn poll_timers(&mut self, now: Instant) -> usize {
        self.now = now;
        let mut fired = 0;
        for index in 0..self.loaded.len() {
            let due = self.loaded[index].timers.due(now);
            for id in due {
                let Some((module, peers)) = Peers::around(&mut self.loaded, index) else {
                    break;
                };
                let Some(mut timer) = module.timers.take(id) else {
                    continue;
                };
                let result = {
                    let mut ctx = ModuleContext::new(
                        &module.name,
                        &mut self.dispatch,
                        &mut module.timers,
                        peers,
                        now,
                    );
                    guard(|| (timer.callback)(&mut ctx))
                };
                if let Err(err) = result {
                    error!(module = %module.name, timer = id.id(), error = %format!("{err:#}"), "error running timer");
                }
                module.timers.finish(id, timer, now);
                fired += 1;
            }
        }
        fired
    }

    /// Pending timers of a loaded module.
    pub fn active_timers(&self, name: &str) -> usize {
        let name = name.to_lowercase();
        self.loaded
            .iter()
            .find(|module| module.name == name)
            .map_or(0, |module| module.timers.len())
    }
}

impl Drop for ModuleManager {
    fn drop(&mut self) {
        self.unload_all();
    }
}

impl std::fmt::Debug for ModuleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleManager")
            .field("root", &self.root)
            .field("installed", &self.installed.len())
            .field("loaded", &self.loaded_names())
            .finish_non_exhaustive()
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
            Err(anyhow::anyhow!("module panicked: {message}"))
        }
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
