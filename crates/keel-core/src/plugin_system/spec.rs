use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use serde_json::Value;

use crate::plugin_system::dependency::{DependencyKind, PluginArgumentDescription, PluginDependency};
use crate::plugin_system::loader::{NULL_INSTANCE, PluginLoader, panic_message};
use crate::plugin_system::metadata::PluginMetaData;
use crate::plugin_system::traits::{Plugin, PluginContext, ShutdownFlag};
use crate::plugin_system::version::compare_versions;
use crate::utils::platform_name;

static HOST_PLATFORM: LazyLock<String> = LazyLock::new(platform_name);

/// Lifecycle state of a plugin, in the order a plugin moves through them
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PluginState {
    Invalid,
    Read,
    Resolved,
    Loaded,
    Initialized,
    Running,
    Stopped,
    Deleted,
}

impl PluginState {
    /// The state a plugin must be in to move to `self`
    pub fn previous(self) -> Option<PluginState> {
        match self {
            PluginState::Invalid => None,
            PluginState::Read => Some(PluginState::Invalid),
            PluginState::Resolved => Some(PluginState::Read),
            PluginState::Loaded => Some(PluginState::Resolved),
            PluginState::Initialized => Some(PluginState::Loaded),
            PluginState::Running => Some(PluginState::Initialized),
            PluginState::Stopped => Some(PluginState::Running),
            PluginState::Deleted => Some(PluginState::Stopped),
        }
    }
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Index of a spec inside the manager's spec list
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpecId(pub(crate) usize);

impl SpecId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Metadata, state and instance of one discovered plugin.
pub struct PluginSpec {
    meta: PluginMetaData,
    location: PathBuf,
    loader: usize,

    state: PluginState,
    has_error: bool,
    error_string: String,

    enabled_by_default: bool,
    enabled_by_settings: bool,
    force_enabled: bool,
    force_disabled: bool,
    enabled_indirectly: bool,

    pub(crate) dependency_specs: Vec<(PluginDependency, SpecId)>,
    plugin: Option<Box<dyn Plugin>>,
    arguments: Vec<String>,
}

impl PluginSpec {
    fn empty(location: PathBuf, loader: usize) -> Self {
        Self {
            meta: PluginMetaData::default(),
            location,
            loader,
            state: PluginState::Invalid,
            has_error: false,
            error_string: String::new(),
            enabled_by_default: true,
            enabled_by_settings: true,
            force_enabled: false,
            force_disabled: false,
            enabled_indirectly: false,
            dependency_specs: Vec::new(),
            plugin: None,
            arguments: Vec::new(),
        }
    }

    /// Build a spec from a metadata record.
    ///
    /// Returns `None` if the record does not describe a plugin for `iid`.
    /// Malformed metadata still yields a spec, left `Invalid` with an error.
    pub fn read(location: impl Into<PathBuf>, loader: usize, record: &Value, iid: &str) -> Option<Self> {
        let mut spec = Self::empty(location.into(), loader);
        match spec.meta.read(record, iid) {
            Ok(false) => return None,
            Ok(true) => {
                spec.enabled_by_default = !spec.meta.disabled_by_default && !spec.meta.experimental;
                spec.enabled_by_settings = spec.enabled_by_default;
                spec.state = PluginState::Read;
            }
            Err(e) => {
                log::debug!("Invalid metadata in '{}': {}", spec.location.display(), e);
                spec.report_error(e.to_string());
            }
        }
        Some(spec)
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn version(&self) -> &str {
        &self.meta.version
    }

    pub fn compat_version(&self) -> &str {
        &self.meta.compat_version
    }

    pub fn vendor(&self) -> &str {
        &self.meta.vendor
    }

    pub fn copyright(&self) -> &str {
        &self.meta.copyright
    }

    pub fn license(&self) -> &str {
        &self.meta.license
    }

    pub fn description(&self) -> &str {
        &self.meta.description
    }

    pub fn url(&self) -> &str {
        &self.meta.url
    }

    pub fn category(&self) -> &str {
        &self.meta.category
    }

    pub fn metadata(&self) -> &PluginMetaData {
        &self.meta
    }

    pub fn dependencies(&self) -> &[PluginDependency] {
        &self.meta.dependencies
    }

    pub fn argument_descriptions(&self) -> &[PluginArgumentDescription] {
        &self.meta.arguments
    }

    /// Where the plugin was found (a file path or `static:<name>`)
    pub fn location(&self) -> &Path {
        &self.location
    }

    pub(crate) fn loader_index(&self) -> usize {
        self.loader
    }

    pub fn state(&self) -> PluginState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: PluginState) {
        self.state = state;
    }

    pub fn has_error(&self) -> bool {
        self.has_error
    }

    pub fn error_string(&self) -> &str {
        &self.error_string
    }

    pub(crate) fn report_error(&mut self, error: impl Into<String>) {
        self.error_string = error.into();
        self.has_error = true;
    }

    /// Append a line to the error, keeping earlier ones
    pub(crate) fn append_error(&mut self, error: &str) {
        if !self.error_string.is_empty() {
            self.error_string.push('\n');
        }
        self.error_string.push_str(error);
        self.has_error = true;
    }

    pub fn is_required(&self) -> bool {
        self.meta.required
    }

    pub fn is_experimental(&self) -> bool {
        self.meta.experimental
    }

    pub fn is_enabled_by_default(&self) -> bool {
        self.enabled_by_default
    }

    pub fn is_enabled_by_settings(&self) -> bool {
        self.enabled_by_settings
    }

    pub fn is_force_enabled(&self) -> bool {
        self.force_enabled
    }

    pub fn is_force_disabled(&self) -> bool {
        self.force_disabled
    }

    pub fn is_enabled_indirectly(&self) -> bool {
        self.enabled_indirectly
    }

    pub fn is_available_for_host_platform(&self) -> bool {
        self.meta
            .platform
            .as_ref()
            .is_none_or(|pattern| pattern.is_match(&HOST_PLATFORM))
    }

    /// Whether the plugin is to be loaded, taking every enable source into account.
    ///
    /// Platform availability is absolute. Otherwise a forced or indirect
    /// enable wins, then a forced disable, then the settings.
    pub fn is_effectively_enabled(&self) -> bool {
        if !self.is_available_for_host_platform() {
            return false;
        }
        if self.force_enabled || self.enabled_indirectly {
            return true;
        }
        if self.force_disabled {
            return false;
        }
        self.enabled_by_settings
    }

    pub fn set_enabled_by_default(&mut self, value: bool) {
        self.enabled_by_default = value;
    }

    pub fn set_enabled_by_settings(&mut self, value: bool) {
        self.enabled_by_settings = value;
    }

    pub fn set_force_enabled(&mut self, value: bool) {
        self.force_enabled = value;
        if value {
            self.force_disabled = false;
        }
    }

    pub fn set_force_disabled(&mut self, value: bool) {
        if value {
            self.force_enabled = false;
        }
        self.force_disabled = value;
    }

    pub(crate) fn set_enabled_indirectly(&mut self, value: bool) {
        self.enabled_indirectly = value;
    }

    /// Whether this plugin can stand in for `name` at `version`:
    /// `compat_version <= version <= self.version`.
    pub fn provides(&self, name: &str, version: &str) -> bool {
        if name.to_lowercase() != self.meta.name.to_lowercase() {
            return false;
        }
        compare_versions(&self.meta.version, version).is_ge() && compare_versions(&self.meta.compat_version, version).is_le()
    }

    /// Resolved dependencies in declaration order
    pub fn dependency_specs(&self) -> &[(PluginDependency, SpecId)] {
        &self.dependency_specs
    }

    /// Whether any resolved required dependency is in `ids`
    pub fn requires_any(&self, ids: &[SpecId]) -> bool {
        self.dependency_specs
            .iter()
            .any(|(dep, id)| dep.kind == DependencyKind::Required && ids.contains(id))
    }

    pub fn plugin(&self) -> Option<&dyn Plugin> {
        self.plugin.as_deref()
    }

    pub fn plugin_mut(&mut self) -> Option<&mut (dyn Plugin + 'static)> {
        self.plugin.as_deref_mut()
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    pub fn set_arguments(&mut self, arguments: Vec<String>) {
        self.arguments = arguments;
    }

    pub fn add_argument(&mut self, argument: impl Into<String>) {
        self.arguments.push(argument.into());
    }

    //--------------------------------------------------
    // Lifecycle transitions
    //--------------------------------------------------

    pub(crate) fn load_library(&mut self, loader: &dyn PluginLoader) -> bool {
        if self.has_error {
            return false;
        }
        if self.state != PluginState::Resolved {
            if self.state == PluginState::Loaded {
                return true;
            }
            self.report_error("Loading the library failed because state != Resolved");
            return false;
        }
        match loader.load_instance(&self.location) {
            Ok(plugin) => {
                self.plugin = Some(plugin);
                self.state = PluginState::Loaded;
                true
            }
            Err(e) if e == NULL_INSTANCE => {
                self.report_error(e);
                false
            }
            Err(e) => {
                self.report_error(format!("{}: {}", self.location.display(), e));
                false
            }
        }
    }

    pub(crate) fn initialize_plugin(&mut self, ctx: &PluginContext<'_>) -> bool {
        if self.has_error {
            return false;
        }
        if self.state != PluginState::Loaded {
            if self.state == PluginState::Initialized {
                return true;
            }
            self.report_error("Initializing the plugin failed because state != Loaded");
            return false;
        }
        let Some(plugin) = self.plugin.as_mut() else {
            self.report_error("Internal error: have no plugin instance to initialize");
            return false;
        };
        let arguments = &self.arguments;
        match panic::catch_unwind(AssertUnwindSafe(|| plugin.initialize(ctx, arguments))) {
            Ok(Ok(())) => {
                self.state = PluginState::Initialized;
                true
            }
            Ok(Err(e)) => {
                self.report_error(format!("Plugin initialization failed: {}", e));
                false
            }
            Err(payload) => {
                self.report_error(format!("Plugin panicked during initialize: {}", panic_message(&*payload)));
                false
            }
        }
    }

    pub(crate) fn initialize_extensions(&mut self, ctx: &PluginContext<'_>) -> bool {
        if self.has_error {
            return false;
        }
        if self.state != PluginState::Initialized {
            if self.state == PluginState::Running {
                return true;
            }
            self.report_error("Cannot perform extensionsInitialized because state != Initialized");
            return false;
        }
        let Some(plugin) = self.plugin.as_mut() else {
            self.report_error("Internal error: have no plugin instance to perform extensionsInitialized");
            return false;
        };
        match panic::catch_unwind(AssertUnwindSafe(|| plugin.extensions_initialized(ctx))) {
            Ok(()) => {
                self.state = PluginState::Running;
                true
            }
            Err(payload) => {
                self.report_error(format!(
                    "Plugin panicked during extensionsInitialized: {}",
                    panic_message(&*payload)
                ));
                false
            }
        }
    }

    /// Returns whether the plugin asked to yield before the next plugin's turn
    pub(crate) fn delayed_initialize(&mut self, ctx: &PluginContext<'_>) -> bool {
        if self.has_error || self.state != PluginState::Running {
            return false;
        }
        let Some(plugin) = self.plugin.as_mut() else {
            self.report_error("Internal error: have no plugin instance to perform delayedInitialize");
            return false;
        };
        match panic::catch_unwind(AssertUnwindSafe(|| plugin.delayed_initialize(ctx))) {
            Ok(wants_delay) => wants_delay,
            Err(payload) => {
                self.report_error(format!(
                    "Plugin panicked during delayedInitialize: {}",
                    panic_message(&*payload)
                ));
                false
            }
        }
    }

    pub(crate) fn stop(&mut self, ctx: &PluginContext<'_>) -> ShutdownFlag {
        let Some(plugin) = self.plugin.as_mut() else {
            return ShutdownFlag::Synchronous;
        };
        self.state = PluginState::Stopped;
        match panic::catch_unwind(AssertUnwindSafe(|| plugin.about_to_shutdown(ctx))) {
            Ok(flag) => flag,
            Err(payload) => {
                self.report_error(format!(
                    "Plugin panicked during aboutToShutdown: {}",
                    panic_message(&*payload)
                ));
                ShutdownFlag::Synchronous
            }
        }
    }

    /// Destroy the plugin instance
    pub(crate) fn kill(&mut self) {
        let Some(plugin) = self.plugin.take() else {
            return;
        };
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || drop(plugin))) {
            log::error!("Plugin '{}' panicked while being destroyed: {}", self.name(), panic_message(&*payload));
        }
        self.state = PluginState::Deleted;
    }
}

impl fmt::Debug for PluginSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginSpec")
            .field("name", &self.meta.name)
            .field("version", &self.meta.version)
            .field("location", &self.location)
            .field("state", &self.state)
            .field("has_error", &self.has_error)
            .field("error_string", &self.error_string)
            .field("effectively_enabled", &self.is_effectively_enabled())
            .finish_non_exhaustive()
    }
}
