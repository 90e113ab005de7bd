//! # Plugin loaders
//!
//! A loader turns a location into metadata and, later, into a live plugin
//! instance. The resolver and the state machine never look inside a loader,
//! so plugins compiled into the host and plugins shipped as shared libraries
//! go through exactly the same lifecycle.
use std::any::Any;
use std::ffi::{CStr, c_char, c_void};
use std::panic;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::{Library, Symbol};
use parking_lot::Mutex;
use serde_json::Value;

use crate::kernel::error::{Error, Result};
use crate::plugin_system::traits::{Plugin, PluginContext, PluginTest, ShutdownFlag};
use crate::utils::fs::find_libraries;

/// Exported by a plugin library; returns its metadata record as JSON
pub const METADATA_SYMBOL: &[u8] = b"keel_plugin_metadata\0";
/// Exported by a plugin library; returns a `Box<Box<dyn Plugin>>` as `*mut c_void`
pub const CREATE_SYMBOL: &[u8] = b"keel_plugin_create\0";

type MetadataFn = unsafe extern "C" fn() -> *const c_char;
type CreateFn = unsafe extern "C" fn() -> *mut c_void;

/// Source of plugin metadata and instances
pub trait PluginLoader: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Locations this loader can read below `paths`
    fn candidates(&self, paths: &[PathBuf]) -> Result<Vec<PathBuf>>;

    /// The metadata record at `location`, or `None` if it is not readable
    fn probe_metadata(&self, location: &Path) -> Option<Value>;

    /// Materialize the plugin at `location`
    fn load_instance(&self, location: &Path) -> std::result::Result<Box<dyn Plugin>, String>;
}

/// Text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic reason".to_string()
    }
}

//--------------------------------------------------
// Shared libraries
//--------------------------------------------------

/// Loads plugins from shared libraries exporting the `keel_plugin_*` symbols.
///
/// Library plugins must be built with the same compiler and `keel-core`
/// version as the host; use [`declare_plugin!`](crate::declare_plugin) to
/// export the symbols.
#[derive(Debug, Default)]
pub struct LibraryLoader;

impl LibraryLoader {
    pub fn new() -> Self {
        Self
    }

    fn open(location: &Path) -> std::result::Result<Library, String> {
        // Running a library's initializers is inherent to loading plugins.
        unsafe { Library::new(location) }.map_err(|e| e.to_string())
    }

    fn read_metadata(library: &Library) -> std::result::Result<Value, String> {
        let metadata_fn: Symbol<MetadataFn> =
            unsafe { library.get(METADATA_SYMBOL) }.map_err(|e| format!("missing symbol keel_plugin_metadata: {}", e))?;
        let func: MetadataFn = *metadata_fn;
        let ptr = panic::catch_unwind(|| unsafe { func() })
            .map_err(|e| format!("panic while reading metadata: {}", panic_message(&*e)))?;
        if ptr.is_null() {
            return Err("keel_plugin_metadata returned null".to_string());
        }
        let text = unsafe { CStr::from_ptr(ptr) }
            .to_str()
            .map_err(|e| format!("metadata is not valid UTF-8: {}", e))?;
        serde_json::from_str(text).map_err(|e| format!("metadata is not valid JSON: {}", e))
    }
}

impl PluginLoader for LibraryLoader {
    fn name(&self) -> &str {
        "library"
    }

    fn candidates(&self, paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut libraries = Vec::new();
        for path in paths {
            let found = find_libraries(std::slice::from_ref(path))
                .map_err(|e| Error::io(e, "scan plugin directory", path.clone()))?;
            libraries.extend(found);
        }
        Ok(libraries)
    }

    fn probe_metadata(&self, location: &Path) -> Option<Value> {
        let library = match Self::open(location) {
            Ok(library) => library,
            Err(e) => {
                log::debug!("Cannot open '{}' for probing: {}", location.display(), e);
                return None;
            }
        };
        match Self::read_metadata(&library) {
            Ok(record) => Some(record),
            Err(e) => {
                log::debug!("'{}' is not a plugin library: {}", location.display(), e);
                None
            }
        }
    }

    fn load_instance(&self, location: &Path) -> std::result::Result<Box<dyn Plugin>, String> {
        let library = Arc::new(Self::open(location)?);
        let func: CreateFn = {
            let symbol: Symbol<CreateFn> = unsafe { library.get(CREATE_SYMBOL) }
                .map_err(|e| format!("missing symbol keel_plugin_create: {}", e))?;
            *symbol
        };
        let raw = panic::catch_unwind(|| unsafe { func() })
            .map_err(|e| format!("panic while creating plugin: {}", panic_message(&*e)))?;
        if raw.is_null() {
            return Err(NULL_INSTANCE.to_string());
        }
        // keel_plugin_create hands out a leaked Box<Box<dyn Plugin>>.
        let plugin: Box<Box<dyn Plugin>> = unsafe { Box::from_raw(raw as *mut Box<dyn Plugin>) };
        Ok(Box::new(LibraryPlugin {
            plugin: *plugin,
            _library: library,
        }))
    }
}

pub(crate) const NULL_INSTANCE: &str = "Plugin is not valid (does not implement the plugin contract)";

/// Keeps the library mapped for as long as the instance lives.
///
/// Field order matters: the plugin is dropped before the library.
struct LibraryPlugin {
    plugin: Box<dyn Plugin>,
    _library: Arc<Library>,
}

impl Plugin for LibraryPlugin {
    fn initialize(&mut self, ctx: &PluginContext<'_>, arguments: &[String]) -> std::result::Result<(), String> {
        self.plugin.initialize(ctx, arguments)
    }

    fn extensions_initialized(&mut self, ctx: &PluginContext<'_>) {
        self.plugin.extensions_initialized(ctx)
    }

    fn delayed_initialize(&mut self, ctx: &PluginContext<'_>) -> bool {
        self.plugin.delayed_initialize(ctx)
    }

    fn about_to_shutdown(&mut self, ctx: &PluginContext<'_>) -> ShutdownFlag {
        self.plugin.about_to_shutdown(ctx)
    }

    fn remote_command(
        &mut self,
        options: &[String],
        working_directory: &str,
        arguments: &[String],
    ) -> Option<Box<dyn Any + Send>> {
        self.plugin.remote_command(options, working_directory, arguments)
    }

    fn tests(&self) -> Vec<PluginTest> {
        self.plugin.tests()
    }
}

/// Export the symbols [`LibraryLoader`] looks for.
///
/// ```ignore
/// keel_core::declare_plugin!(include_str!("metadata.json"), MyPlugin::default());
/// ```
#[macro_export]
macro_rules! declare_plugin {
    ($metadata:expr, $constructor:expr) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn keel_plugin_metadata() -> *const ::std::ffi::c_char {
            static __KEEL_PLUGIN_METADATA: ::std::sync::OnceLock<::std::ffi::CString> = ::std::sync::OnceLock::new();
            __KEEL_PLUGIN_METADATA
                .get_or_init(|| ::std::ffi::CString::new($metadata).unwrap_or_default())
                .as_ptr()
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn keel_plugin_create() -> *mut ::std::ffi::c_void {
            let plugin: ::std::boxed::Box<dyn $crate::plugin_system::Plugin> = ::std::boxed::Box::new($constructor);
            ::std::boxed::Box::into_raw(::std::boxed::Box::new(plugin)) as *mut ::std::ffi::c_void
        }
    };
}

//--------------------------------------------------
// In-process plugins
//--------------------------------------------------

/// Factory for a statically registered plugin; `None` violates the contract
pub type PluginFactory = Box<dyn Fn() -> Option<Box<dyn Plugin>> + Send + Sync>;

struct StaticEntry {
    metadata: Value,
    factory: PluginFactory,
}

/// Plugins compiled into the host, addressed as `static:<name>`
#[derive(Default)]
pub struct StaticLoader {
    entries: Mutex<Vec<(PathBuf, StaticEntry)>>,
}

impl StaticLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin under `name` with its metadata record
    pub fn register<F, P>(&self, name: &str, metadata: Value, factory: F)
    where
        F: Fn() -> P + Send + Sync + 'static,
        P: Plugin + 'static,
    {
        self.register_factory(
            name,
            metadata,
            Box::new(move || Some(Box::new(factory()) as Box<dyn Plugin>)),
        );
    }

    /// Register a plugin whose factory may fail to produce an instance
    pub fn register_factory(&self, name: &str, metadata: Value, factory: PluginFactory) {
        let location = Self::location(name);
        let mut entries = self.entries.lock();
        entries.retain(|(existing, _)| existing != &location);
        entries.push((location, StaticEntry { metadata, factory }));
    }

    pub fn location(name: &str) -> PathBuf {
        PathBuf::from(format!("static:{}", name))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl std::fmt::Debug for StaticLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.lock();
        f.debug_struct("StaticLoader")
            .field("plugins", &entries.iter().map(|(l, _)| l.clone()).collect::<Vec<_>>())
            .finish()
    }
}

impl PluginLoader for StaticLoader {
    fn name(&self) -> &str {
        "static"
    }

    fn candidates(&self, _paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
        Ok(self.entries.lock().iter().map(|(location, _)| location.clone()).collect())
    }

    fn probe_metadata(&self, location: &Path) -> Option<Value> {
        self.entries
            .lock()
            .iter()
            .find(|(l, _)| l == location)
            .map(|(_, entry)| entry.metadata.clone())
    }

    fn load_instance(&self, location: &Path) -> std::result::Result<Box<dyn Plugin>, String> {
        let entries = self.entries.lock();
        let (_, entry) = entries
            .iter()
            .find(|(l, _)| l == location)
            .ok_or_else(|| "no such static plugin".to_string())?;
        (entry.factory)().ok_or_else(|| NULL_INSTANCE.to_string())
    }
}
