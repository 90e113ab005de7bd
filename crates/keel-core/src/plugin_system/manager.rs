//! # Keel Plugin Manager
//!
//! [`PluginManager`] owns every discovered [`PluginSpec`] and drives them
//! through their lifecycle:
//!
//! 1. **Discovery** ([`set_plugin_paths`](PluginManager::set_plugin_paths)):
//!    every loader lists candidate locations, each candidate's metadata is read
//!    into a spec, persisted enable/disable settings are applied and
//!    dependencies are resolved.
//! 2. **Loading** ([`load_plugins`](PluginManager::load_plugins)): the load
//!    queue is walked forward to `Loaded` and `Initialized`, then backwards to
//!    `Running`.
//! 3. **Delayed initialization**
//!    ([`run_delayed_initialize`](PluginManager::run_delayed_initialize)):
//!    running plugins get their deferred callback, spread over timer ticks.
//! 4. **Shutdown** ([`shutdown`](PluginManager::shutdown)): the queue is walked
//!    backwards to `Stopped`, asynchronous shutdowns are awaited, then every
//!    instance is deleted.
//!
//! Plugin failures never surface as `Err` here. They are recorded on the
//! failing spec and on everything that depends on it.
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::event::SharedEventDispatcher;
use crate::event::types::PluginEvent;
use crate::kernel::constants::{
    APP_NAME, DEFAULT_PLUGIN_IID, DELAYED_INITIALIZE_INTERVAL_MS, SETTINGS_FORCE_ENABLED_PLUGINS,
    SETTINGS_IGNORED_PLUGINS,
};
use crate::kernel::error::{Error, Result};
use crate::object_pool::ObjectPool;
use crate::plugin_system::dependency::DependencyKind;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::loader::PluginLoader;
use crate::plugin_system::lock_file::{
    CrashRecoveryPrompt, DisableProblematicPlugin, LockFile, lock_file_path, locked_plugin_name,
};
use crate::plugin_system::options::OptionsParser;
use crate::plugin_system::profiler::Profiler;
use crate::plugin_system::resolver;
use crate::plugin_system::spec::{PluginSpec, PluginState, SpecId};
use crate::plugin_system::traits::{PluginContext, ShutdownFlag};
use crate::storage::config::HostConfig;
use crate::storage::settings::SettingsStore;

/// A plugin selected for a test run, with optional test-function patterns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSpec {
    pub spec: SpecId,
    /// `function[:data]` patterns; empty means every test
    pub test_functions: Vec<String>,
}

/// Discovers, resolves and runs plugins.
pub struct PluginManager {
    app_name: String,
    plugin_iid: String,
    plugin_paths: Vec<PathBuf>,
    install_dir: PathBuf,
    delayed_initialize_interval: Duration,
    pub(crate) crash_check: bool,

    loaders: Vec<Box<dyn PluginLoader>>,
    pub(crate) specs: Vec<PluginSpec>,
    categories: BTreeMap<String, Vec<SpecId>>,

    settings: Option<Box<dyn SettingsStore>>,
    global_settings: Option<Box<dyn SettingsStore>>,
    crash_prompt: Box<dyn CrashRecoveryPrompt>,

    pool: Arc<ObjectPool>,
    delayed_initialize_queue: VecDeque<SpecId>,
    initialization_done: bool,
    asynchronous_plugins: HashSet<String>,
    shutdown_tx: UnboundedSender<String>,
    shutdown_rx: UnboundedReceiver<String>,

    pub(crate) profiler: Option<Profiler>,
    pub(crate) test_specs: Vec<TestSpec>,
    pub(crate) arguments: Vec<String>,
    pub(crate) arguments_for_restart: Vec<String>,
}

impl PluginManager {
    /// A manager with its own object pool and event dispatcher
    pub fn new() -> Self {
        Self::with_pool(Arc::new(ObjectPool::new(SharedEventDispatcher::new())))
    }

    pub fn with_pool(pool: Arc<ObjectPool>) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::unbounded_channel();
        Self {
            app_name: APP_NAME.to_string(),
            plugin_iid: DEFAULT_PLUGIN_IID.to_string(),
            plugin_paths: Vec::new(),
            install_dir: PathBuf::new(),
            delayed_initialize_interval: Duration::from_millis(DELAYED_INITIALIZE_INTERVAL_MS),
            crash_check: true,
            loaders: Vec::new(),
            specs: Vec::new(),
            categories: BTreeMap::new(),
            settings: None,
            global_settings: None,
            crash_prompt: Box::new(DisableProblematicPlugin),
            pool,
            delayed_initialize_queue: VecDeque::new(),
            initialization_done: false,
            asynchronous_plugins: HashSet::new(),
            shutdown_tx,
            shutdown_rx,
            profiler: None,
            test_specs: Vec::new(),
            arguments: Vec::new(),
            arguments_for_restart: Vec::new(),
        }
    }

    /// Take application name, interface id, crash check and timing from `config`.
    ///
    /// Plugin paths are not scanned here; pass them to
    /// [`set_plugin_paths`](Self::set_plugin_paths) once loaders and settings
    /// are in place.
    pub fn apply_config(&mut self, config: &HostConfig) {
        self.app_name = config.app_name.clone();
        self.plugin_iid = config.plugin_iid.clone();
        self.crash_check = config.crash_check;
        self.delayed_initialize_interval = Duration::from_millis(config.delayed_initialize_interval_ms);
    }

    //--------------------------------------------------
    // Configuration
    //--------------------------------------------------

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn set_app_name(&mut self, name: impl Into<String>) {
        self.app_name = name.into();
    }

    pub fn plugin_iid(&self) -> &str {
        &self.plugin_iid
    }

    /// Only metadata records carrying this interface id are plugins
    pub fn set_plugin_iid(&mut self, iid: impl Into<String>) {
        self.plugin_iid = iid.into();
    }

    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    /// Hashed into the lock file name
    pub fn set_install_dir(&mut self, dir: impl Into<PathBuf>) {
        self.install_dir = dir.into();
    }

    pub fn set_delayed_initialize_interval(&mut self, interval: Duration) {
        self.delayed_initialize_interval = interval;
    }

    pub fn is_crash_check_enabled(&self) -> bool {
        self.crash_check
    }

    pub fn set_crash_check_enabled(&mut self, enabled: bool) {
        self.crash_check = enabled;
    }

    pub fn set_crash_recovery_prompt(&mut self, prompt: Box<dyn CrashRecoveryPrompt>) {
        self.crash_prompt = prompt;
    }

    pub fn add_loader(&mut self, loader: Box<dyn PluginLoader>) {
        self.loaders.push(loader);
    }

    /// User settings: disabled and force-enabled plugins
    pub fn set_settings(&mut self, settings: Box<dyn SettingsStore>) {
        self.settings = Some(settings);
    }

    /// Installation settings: plugins disabled or enabled by default
    pub fn set_global_settings(&mut self, settings: Box<dyn SettingsStore>) {
        self.global_settings = Some(settings);
    }

    pub fn settings(&self) -> Option<&dyn SettingsStore> {
        self.settings.as_deref()
    }

    pub fn pool(&self) -> &Arc<ObjectPool> {
        &self.pool
    }

    pub fn events(&self) -> &SharedEventDispatcher {
        self.pool.events()
    }

    pub fn plugin_paths(&self) -> &[PathBuf] {
        &self.plugin_paths
    }

    //--------------------------------------------------
    // Discovery
    //--------------------------------------------------

    /// Scan `paths` with every loader, replacing the current spec set.
    pub fn set_plugin_paths(&mut self, paths: Vec<PathBuf>) -> Result<()> {
        self.plugin_paths = paths;
        self.read_plugin_paths()
    }

    fn read_plugin_paths(&mut self) -> Result<()> {
        let default_disabled = self.global_list(SETTINGS_IGNORED_PLUGINS);
        let default_enabled = self.global_list(SETTINGS_FORCE_ENABLED_PLUGINS);
        let disabled = self.user_list(SETTINGS_IGNORED_PLUGINS);
        let force_enabled = self.user_list(SETTINGS_FORCE_ENABLED_PLUGINS);

        let mut discovered = Vec::new();
        for (index, loader) in self.loaders.iter().enumerate() {
            let candidates = loader.candidates(&self.plugin_paths).map_err(|e| {
                Error::from(PluginSystemError::ScanFailed {
                    loader: loader.name().to_string(),
                    path: self.plugin_paths.first().cloned().unwrap_or_default(),
                    message: e.to_string(),
                })
            })?;
            log::debug!("Loader '{}' found {} candidate(s)", loader.name(), candidates.len());
            for location in candidates {
                let Some(record) = loader.probe_metadata(&location) else {
                    continue;
                };
                let Some(mut spec) = PluginSpec::read(location, index, &record, &self.plugin_iid) else {
                    continue;
                };
                apply_enable_settings(&mut spec, &default_disabled, &default_enabled, &disabled, &force_enabled);
                discovered.push(spec);
            }
        }

        // Resolution picks the first provider in list order, so fix the order.
        discovered.sort_by(|a, b| a.name().cmp(b.name()));
        self.specs = discovered;
        self.test_specs.clear();
        self.categories.clear();
        self.categories.insert(String::new(), Vec::new());
        for (index, spec) in self.specs.iter().enumerate() {
            self.categories
                .entry(spec.category().to_string())
                .or_default()
                .push(SpecId(index));
        }

        resolver::resolve_all(&mut self.specs);
        self.enable_dependencies_indirectly();
        log::info!("Discovered {} plugin(s)", self.specs.len());
        self.events().post(PluginEvent::PluginsChanged);
        Ok(())
    }

    fn global_list(&self, key: &str) -> Vec<String> {
        self.global_settings
            .as_ref()
            .map(|s| s.string_list(key))
            .unwrap_or_default()
    }

    fn user_list(&self, key: &str) -> Vec<String> {
        self.settings.as_ref().map(|s| s.string_list(key)).unwrap_or_default()
    }

    pub(crate) fn enable_dependencies_indirectly(&mut self) {
        let tested: Vec<SpecId> = self.test_specs.iter().map(|t| t.spec).collect();
        resolver::enable_dependencies_indirectly(&mut self.specs, &tested);
    }

    /// Store the user's deviations from each plugin's default enablement
    pub fn write_settings(&mut self) -> Result<()> {
        let Some(settings) = self.settings.as_mut() else {
            return Ok(());
        };
        let mut ignored = Vec::new();
        let mut force_enabled = Vec::new();
        for spec in &self.specs {
            if spec.is_enabled_by_default() && !spec.is_enabled_by_settings() {
                ignored.push(spec.name().to_string());
            }
            if !spec.is_enabled_by_default() && spec.is_enabled_by_settings() {
                force_enabled.push(spec.name().to_string());
            }
        }
        settings.set_string_list(SETTINGS_IGNORED_PLUGINS, ignored);
        settings.set_string_list(SETTINGS_FORCE_ENABLED_PLUGINS, force_enabled);
        settings.sync()
    }

    //--------------------------------------------------
    // Queries
    //--------------------------------------------------

    pub fn plugins(&self) -> &[PluginSpec] {
        &self.specs
    }

    pub fn spec(&self, id: SpecId) -> &PluginSpec {
        &self.specs[id.0]
    }

    pub fn spec_mut(&mut self, id: SpecId) -> &mut PluginSpec {
        &mut self.specs[id.0]
    }

    pub fn plugin_id(&self, name: &str) -> Option<SpecId> {
        self.specs.iter().position(|s| s.name() == name).map(SpecId)
    }

    pub fn plugin_by_name(&self, name: &str) -> Option<&PluginSpec> {
        self.specs.iter().find(|s| s.name() == name)
    }

    /// Specs grouped by category; the empty category is always present
    pub fn plugin_collections(&self) -> BTreeMap<&str, Vec<&PluginSpec>> {
        self.categories
            .iter()
            .map(|(category, ids)| (category.as_str(), ids.iter().map(|id| &self.specs[id.0]).collect()))
            .collect()
    }

    /// Specs in load order. Building the queue records cycle errors on the specs.
    pub fn load_queue(&mut self) -> Vec<SpecId> {
        resolver::load_queue(&mut self.specs)
    }

    /// Whether any enabled plugin has an error
    pub fn has_error(&self) -> bool {
        self.specs
            .iter()
            .any(|s| s.has_error() && s.is_effectively_enabled())
    }

    /// `name: error` for every enabled plugin with an error
    pub fn all_errors(&self) -> Vec<String> {
        self.specs
            .iter()
            .filter(|s| s.has_error() && s.is_effectively_enabled())
            .map(|s| format!("{}: {}", s.name(), s.error_string()))
            .collect()
    }

    /// Every plugin that transitively requires `id`, in load order
    pub fn plugins_requiring_plugin(&mut self, id: SpecId) -> Vec<SpecId> {
        let queue = self.load_queue();
        resolver::plugins_requiring(&self.specs, &queue, id)
    }

    /// Every plugin `id` transitively requires
    pub fn plugins_required_by_plugin(&self, id: SpecId) -> Vec<SpecId> {
        resolver::plugins_required_by(&self.specs, id)
    }

    pub fn is_initialization_done(&self) -> bool {
        self.initialization_done
    }

    /// Positional command-line arguments not consumed as options
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// Options to pass when restarting so the same plugins are loaded
    pub fn arguments_for_restart(&self) -> &[String] {
        &self.arguments_for_restart
    }

    pub fn test_specs(&self) -> &[TestSpec] {
        &self.test_specs
    }

    pub fn test_run_requested(&self) -> bool {
        !self.test_specs.is_empty()
    }

    pub fn is_profiling(&self) -> bool {
        self.profiler.is_some()
    }

    pub fn start_profiling(&mut self) {
        if self.profiler.is_none() {
            self.profiler = Some(Profiler::new());
        }
    }

    fn profiling_report(&mut self, what: &str, spec: Option<SpecId>) {
        if let Some(profiler) = self.profiler.as_mut() {
            let name = spec.map(|id| self.specs[id.0].name());
            profiler.report(what, name);
        }
    }

    /// One line per plugin: enabled marker, padded name, version
    pub fn system_information(&self) -> String {
        let mut result = String::from("Plugin information:\n\n");
        let width = self.specs.iter().map(|s| s.name().len()).max().unwrap_or(0);
        for spec in &self.specs {
            let marker = if spec.is_effectively_enabled() { "+ " } else { "  " };
            let _ = writeln!(result, "{}{:<width$} {}", marker, spec.name(), spec.version(), width = width);
        }
        result
    }

    //--------------------------------------------------
    // Command line
    //--------------------------------------------------

    /// Consume command-line tokens.
    ///
    /// `app_options` maps each application option to whether it takes an
    /// argument. Returns the application options found, with their argument
    /// (empty if none).
    pub fn parse_options(
        &mut self,
        args: &[String],
        app_options: &BTreeMap<String, bool>,
    ) -> Result<BTreeMap<String, String>> {
        OptionsParser::new(args, app_options, self).parse()
    }

    /// The spec declaring `option`, and whether the option takes a parameter
    pub fn plugin_for_option(&self, option: &str) -> Option<(SpecId, bool)> {
        self.specs.iter().enumerate().find_map(|(index, spec)| {
            spec.argument_descriptions()
                .iter()
                .find(|arg| arg.name == option)
                .map(|arg| (SpecId(index), !arg.parameter.is_empty()))
        })
    }

    /// Encode the plugin arguments, working directory and positional
    /// arguments for another running instance.
    pub fn serialized_arguments(&self, working_directory: &str) -> String {
        let separator = '|';
        let mut result = String::new();
        for spec in &self.specs {
            if spec.arguments().is_empty() {
                continue;
            }
            if !result.is_empty() {
                result.push(separator);
            }
            result.push(':');
            result.push_str(spec.name());
            for argument in spec.arguments() {
                result.push(separator);
                result.push_str(argument);
            }
        }
        if !result.is_empty() {
            result.push(separator);
        }
        result.push_str(":pwd");
        result.push(separator);
        result.push_str(working_directory);
        if !self.arguments.is_empty() {
            result.push(separator);
            result.push_str(":arguments");
            for argument in &self.arguments {
                result.push(separator);
                result.push_str(argument);
            }
        }
        result
    }

    /// Hand arguments serialized by another instance to each running plugin.
    ///
    /// Returns the handles the plugins produced, by plugin name.
    pub fn remote_arguments(&mut self, serialized: &str) -> Vec<(String, Box<dyn std::any::Any + Send>)> {
        let mut handles = Vec::new();
        if serialized.is_empty() {
            return handles;
        }
        let items: Vec<&str> = serialized.split('|').collect();
        let working_directory = sub_list(&items, ":pwd").into_iter().next().unwrap_or_default();
        let arguments = sub_list(&items, ":arguments");
        for spec in self.specs.iter_mut() {
            if spec.state() != PluginState::Running {
                continue;
            }
            let options = sub_list(&items, &format!(":{}", spec.name()));
            let name = spec.name().to_string();
            let Some(plugin) = spec.plugin_mut() else {
                continue;
            };
            if let Some(handle) = plugin.remote_command(&options, &working_directory, &arguments) {
                handles.push((name, handle));
            }
        }
        handles
    }

    //--------------------------------------------------
    // Crash recovery
    //--------------------------------------------------

    fn lock_file(&self) -> Option<PathBuf> {
        let settings_file = self.settings.as_ref().and_then(|s| s.file_name())?;
        Some(lock_file_path(settings_file, &self.app_name, &self.install_dir))
    }

    /// Offer to disable the plugin a previous run crashed in.
    ///
    /// Call after discovery and before [`load_plugins`](Self::load_plugins).
    /// Required plugins are never disabled.
    pub fn check_for_problematic_plugins(&mut self) {
        if !self.crash_check {
            return;
        }
        let Some(path) = self.lock_file() else {
            return;
        };
        let Some(name) = locked_plugin_name(&path) else {
            return;
        };
        let Some(id) = self.plugin_id(&name) else {
            log::debug!("Lock file names unknown plugin '{}'", name);
            return;
        };
        if self.specs[id.0].is_required() {
            return;
        }
        let mut dependents = self.plugins_requiring_plugin(id);
        dependents.sort_by(|a, b| self.specs[a.0].name().cmp(self.specs[b.0].name()));
        let dependent_names: Vec<String> = dependents.iter().map(|d| self.specs[d.0].name().to_string()).collect();
        if self.crash_prompt.confirm_disable(&self.app_name, &name, &dependent_names) {
            self.specs[id.0].set_force_disabled(true);
            for dependent in dependents {
                self.specs[dependent.0].set_force_disabled(true);
            }
            self.enable_dependencies_indirectly();
        }
    }

    //--------------------------------------------------
    // Lifecycle
    //--------------------------------------------------

    /// Load, initialize and start every enabled plugin.
    ///
    /// Running plugins are queued for delayed initialization; drive it with
    /// [`run_delayed_initialize`](Self::run_delayed_initialize).
    pub fn load_plugins(&mut self) {
        let queue = self.load_queue();
        self.profiling_report(">loadPlugins", None);

        for id in &queue {
            self.load_plugin(*id, PluginState::Loaded);
        }
        for id in &queue {
            self.load_plugin(*id, PluginState::Initialized);
        }

        self.delayed_initialize_queue.clear();
        for id in queue.iter().rev() {
            self.load_plugin(*id, PluginState::Running);
            if self.specs[id.0].state() == PluginState::Running {
                self.delayed_initialize_queue.push_back(*id);
            } else {
                // Plugin initialization failed, so clean up after it
                self.specs[id.0].kill();
            }
        }

        self.profiling_report("<loadPlugins", None);
        for error in self.all_errors() {
            log::error!("{}", error);
        }
        self.events().post(PluginEvent::PluginsChanged);
    }

    fn load_plugin(&mut self, id: SpecId, dest: PluginState) {
        {
            let spec = &self.specs[id.0];
            if spec.has_error() || Some(spec.state()) != dest.previous() {
                return;
            }
            if dest == PluginState::Loaded && !spec.is_effectively_enabled() {
                return;
            }
        }

        let name = self.specs[id.0].name().to_string();
        // A crash while shutting down says nothing about startup problems.
        let _lock = if self.crash_check && dest < PluginState::Stopped {
            self.lock_file().map(|path| LockFile::acquire(path, &name))
        } else {
            None
        };

        // Phases walked in reverse see dependencies one step behind, so only
        // the forward phases check dependency state.
        match dest {
            PluginState::Running => {
                self.profiling_report(">initializeExtensions", Some(id));
                let ctx = PluginContext::new(&name, &self.pool, &self.shutdown_tx);
                self.specs[id.0].initialize_extensions(&ctx);
                self.profiling_report("<initializeExtensions", Some(id));
                return;
            }
            PluginState::Stopped => {
                self.profiling_report(">stop", Some(id));
                let ctx = PluginContext::new(&name, &self.pool, &self.shutdown_tx);
                if self.specs[id.0].stop(&ctx) == ShutdownFlag::Asynchronous {
                    self.asynchronous_plugins.insert(name.clone());
                }
                self.profiling_report("<stop", Some(id));
                return;
            }
            PluginState::Deleted => {
                self.profiling_report(">delete", Some(id));
                self.specs[id.0].kill();
                self.profiling_report("<delete", Some(id));
                return;
            }
            _ => {}
        }

        let failed_dependency = self.specs[id.0]
            .dependency_specs()
            .iter()
            .filter(|(dep, _)| dep.kind == DependencyKind::Required)
            .map(|(_, dep_id)| &self.specs[dep_id.0])
            .find(|dep| dep.state() != dest)
            .map(|dep| {
                format!(
                    "Cannot load plugin because dependency failed to load: {}({})\nReason: {}",
                    dep.name(),
                    dep.version(),
                    dep.error_string()
                )
            });
        if let Some(error) = failed_dependency {
            self.specs[id.0].report_error(error);
            return;
        }

        match dest {
            PluginState::Loaded => {
                self.profiling_report(">loadLibrary", Some(id));
                let loader = &*self.loaders[self.specs[id.0].loader_index()];
                self.specs[id.0].load_library(loader);
                self.profiling_report("<loadLibrary", Some(id));
            }
            PluginState::Initialized => {
                self.profiling_report(">initializePlugin", Some(id));
                let ctx = PluginContext::new(&name, &self.pool, &self.shutdown_tx);
                self.specs[id.0].initialize_plugin(&ctx);
                self.profiling_report("<initializePlugin", Some(id));
            }
            _ => {}
        }
    }

    /// Run delayed initialization until a plugin asks to yield or none are left.
    ///
    /// Returns whether plugins are still waiting. When the last one is done,
    /// initialization is marked complete, `InitializationDone` is posted and
    /// a requested test run is started.
    pub fn next_delayed_initialize(&mut self) -> bool {
        while let Some(id) = self.delayed_initialize_queue.pop_front() {
            let name = self.specs[id.0].name().to_string();
            self.profiling_report(">delayedInitialize", Some(id));
            let ctx = PluginContext::new(&name, &self.pool, &self.shutdown_tx);
            let delay = self.specs[id.0].delayed_initialize(&ctx);
            self.profiling_report("<delayedInitialize", Some(id));
            if delay {
                break;
            }
        }
        if !self.delayed_initialize_queue.is_empty() {
            return true;
        }
        if !self.initialization_done {
            self.initialization_done = true;
            if let Some(profiler) = &self.profiler {
                profiler.summary();
            }
            log::info!("Plugin initialization done");
            self.events().post(PluginEvent::InitializationDone);
            if self.test_run_requested() {
                self.run_tests();
            }
        }
        false
    }

    /// Drive delayed initialization on a timer until it completes
    pub async fn run_delayed_initialize(&mut self) {
        loop {
            tokio::time::sleep(self.delayed_initialize_interval).await;
            if !self.next_delayed_initialize() {
                break;
            }
        }
    }

    /// Stop and delete every plugin, awaiting asynchronous shutdowns.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.delayed_initialize_queue.clear();
        // Signals from handles dropped before shutdown do not count.
        while self.shutdown_rx.try_recv().is_ok() {}

        self.stop_all();
        if !self.asynchronous_plugins.is_empty() {
            log::info!(
                "Waiting for {} plugin(s) to finish shutting down",
                self.asynchronous_plugins.len()
            );
        }
        while !self.asynchronous_plugins.is_empty() {
            match self.shutdown_rx.recv().await {
                Some(name) => {
                    if self.asynchronous_plugins.remove(&name) {
                        log::debug!("Plugin '{}' finished shutting down", name);
                    }
                }
                None => {
                    return Err(PluginSystemError::ShutdownInterrupted {
                        pending: self.asynchronous_plugins.len(),
                    }
                    .into());
                }
            }
        }
        self.delete_all();

        let leaked = self.pool.report_leaks();
        if leaked > 0 {
            log::warn!("{} object(s) left in the object pool at shutdown", leaked);
        }
        self.events().post(PluginEvent::PluginsChanged);
        Ok(())
    }

    /// Plugins still expected to signal the end of their shutdown
    pub fn pending_asynchronous_shutdowns(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.asynchronous_plugins.iter().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn stop_all(&mut self) {
        self.profiling_report(">stopAll", None);
        let queue = self.load_queue();
        for id in queue.iter().rev() {
            self.load_plugin(*id, PluginState::Stopped);
        }
        self.profiling_report("<stopAll", None);
    }

    fn delete_all(&mut self) {
        self.profiling_report(">deleteAll", None);
        let queue = self.load_queue();
        for id in queue.iter().rev() {
            self.load_plugin(*id, PluginState::Deleted);
        }
        self.profiling_report("<deleteAll", None);
    }

    //--------------------------------------------------
    // Test runs
    //--------------------------------------------------

    /// Run the tests selected with `-test`; returns the number of failures.
    ///
    /// Posts `TestsFinished`. Nothing runs if any enabled plugin has an error,
    /// which counts as one failure.
    pub fn run_tests(&mut self) -> usize {
        if self.has_error() {
            log::error!("Errors occurred while loading plugins, skipping test run.");
            for error in self.all_errors() {
                log::error!("{}", error);
            }
            self.events().post(PluginEvent::TestsFinished { failed: 1 });
            return 1;
        }

        let mut failed = 0;
        for test_spec in &self.test_specs {
            let spec = &self.specs[test_spec.spec.0];
            let Some(plugin) = spec.plugin() else {
                continue;
            };
            let patterns: Vec<Regex> = test_spec
                .test_functions
                .iter()
                .filter_map(|f| wildcard_regex(f.split(':').next().unwrap_or_default()))
                .collect();
            for test in plugin.tests() {
                if !test_spec.test_functions.is_empty() && !patterns.iter().any(|p| p.is_match(&test.name)) {
                    continue;
                }
                match test.run() {
                    Ok(()) => log::info!("PASS   : {}::{}", spec.name(), test.name),
                    Err(message) => {
                        log::error!("FAIL!  : {}::{} {}", spec.name(), test.name, message);
                        failed += 1;
                    }
                }
            }
        }
        log::info!("Totals: {} failed", failed);
        self.events().post(PluginEvent::TestsFinished { failed });
        failed
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginManager")
            .field("app_name", &self.app_name)
            .field("plugin_iid", &self.plugin_iid)
            .field("plugin_paths", &self.plugin_paths)
            .field("specs", &self.specs)
            .field("initialization_done", &self.initialization_done)
            .finish_non_exhaustive()
    }
}

fn apply_enable_settings(
    spec: &mut PluginSpec,
    default_disabled: &[String],
    default_enabled: &[String],
    disabled: &[String],
    force_enabled: &[String],
) {
    let name = spec.name().to_string();
    if spec.is_enabled_by_default() && default_disabled.contains(&name) {
        spec.set_enabled_by_default(false);
        spec.set_enabled_by_settings(false);
    } else if !spec.is_enabled_by_default() && default_enabled.contains(&name) {
        spec.set_enabled_by_default(true);
        spec.set_enabled_by_settings(true);
    }
    if !spec.is_enabled_by_default() && force_enabled.contains(&name) {
        spec.set_enabled_by_settings(true);
    }
    if spec.is_enabled_by_default() && disabled.contains(&name) {
        spec.set_enabled_by_settings(false);
    }
}

/// Items following `key` up to the next `:`-prefixed item
fn sub_list(items: &[&str], key: &str) -> Vec<String> {
    let Some(start) = items.iter().position(|item| *item == key) else {
        return Vec::new();
    };
    items[start + 1..]
        .iter()
        .take_while(|item| !item.starts_with(':'))
        .map(|item| item.to_string())
        .collect()
}

/// Anchored regex for a `*`/`?` wildcard pattern
fn wildcard_regex(pattern: &str) -> Option<Regex> {
    let escaped = regex::escape(pattern).replace(r"\*", ".*").replace(r"\?", ".");
    Regex::new(&format!("^{}$", escaped)).ok()
}
