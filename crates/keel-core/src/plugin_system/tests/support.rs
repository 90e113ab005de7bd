#![cfg(test)]
//! Plugins and managers shared by the plugin system tests.

use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::kernel::constants::DEFAULT_PLUGIN_IID;
use crate::plugin_system::loader::StaticLoader;
use crate::plugin_system::manager::PluginManager;
use crate::plugin_system::spec::SpecId;
use crate::plugin_system::traits::{Plugin, PluginContext, PluginTest, ShutdownFlag, ShutdownSignal};

/// Lifecycle calls in the order they happened, as `call:plugin`
pub type Journal = Arc<Mutex<Vec<String>>>;

pub type SignalSlot = Arc<Mutex<Option<ShutdownSignal>>>;

pub fn metadata(name: &str, version: &str, requires: &[(&str, &str)]) -> Value {
    let dependencies: Vec<Value> = requires
        .iter()
        .map(|(name, version)| json!({ "Name": name, "Version": version }))
        .collect();
    json!({
        "IID": DEFAULT_PLUGIN_IID,
        "MetaData": {
            "Name": name,
            "Version": version,
            "Vendor": "Keel",
            "Description": format!("The {} plugin", name),
            "Dependencies": dependencies,
        }
    })
}

/// Set `key` inside the `MetaData` object of `record`
pub fn with_key(mut record: Value, key: &str, value: Value) -> Value {
    record["MetaData"][key] = value;
    record
}

#[derive(Clone, Default)]
pub struct Behavior {
    pub fail_initialize: Option<String>,
    pub panic_in_extensions_initialized: bool,
    pub wants_delay: bool,
    pub shutdown_slot: Option<SignalSlot>,
    pub tests: Vec<(&'static str, bool)>,
    /// Journal `lock_held:<plugin>:<bool>` from initialize and about_to_shutdown
    pub lock_path: Option<PathBuf>,
}

impl Behavior {
    pub fn failing(message: &str) -> Self {
        Self {
            fail_initialize: Some(message.to_string()),
            ..Self::default()
        }
    }
}

pub struct TestPlugin {
    name: String,
    journal: Journal,
    behavior: Behavior,
}

impl TestPlugin {
    fn record(&self, call: &str) {
        self.journal.lock().push(format!("{}:{}", call, self.name));
        if let Some(path) = &self.behavior.lock_path {
            if call == "initialize" || call == "about_to_shutdown" {
                self.journal
                    .lock()
                    .push(format!("lock_held:{}:{}", self.name, path.exists()));
            }
        }
    }
}

impl Plugin for TestPlugin {
    fn initialize(&mut self, ctx: &PluginContext<'_>, arguments: &[String]) -> Result<(), String> {
        assert_eq!(ctx.plugin_name(), self.name);
        self.record("initialize");
        if !arguments.is_empty() {
            self.journal
                .lock()
                .push(format!("arguments:{}:{}", self.name, arguments.join(" ")));
        }
        match &self.behavior.fail_initialize {
            Some(message) => Err(message.clone()),
            None => Ok(()),
        }
    }

    fn extensions_initialized(&mut self, _ctx: &PluginContext<'_>) {
        self.record("extensions_initialized");
        if self.behavior.panic_in_extensions_initialized {
            panic!("extensions exploded");
        }
    }

    fn delayed_initialize(&mut self, _ctx: &PluginContext<'_>) -> bool {
        self.record("delayed_initialize");
        self.behavior.wants_delay
    }

    fn about_to_shutdown(&mut self, ctx: &PluginContext<'_>) -> ShutdownFlag {
        self.record("about_to_shutdown");
        match &self.behavior.shutdown_slot {
            Some(slot) => {
                *slot.lock() = Some(ctx.shutdown_signal());
                ShutdownFlag::Asynchronous
            }
            None => ShutdownFlag::Synchronous,
        }
    }

    fn remote_command(
        &mut self,
        options: &[String],
        working_directory: &str,
        arguments: &[String],
    ) -> Option<Box<dyn Any + Send>> {
        self.journal.lock().push(format!(
            "remote:{}:{}:{}:{}",
            self.name,
            options.join(" "),
            working_directory,
            arguments.join(" ")
        ));
        Some(Box::new(options.to_vec()))
    }

    fn tests(&self) -> Vec<PluginTest> {
        self.behavior
            .tests
            .iter()
            .map(|(name, passes)| {
                let passes = *passes;
                PluginTest::new(*name, move || if passes { Ok(()) } else { Err("assertion failed".to_string()) })
            })
            .collect()
    }
}

impl Drop for TestPlugin {
    fn drop(&mut self) {
        self.record("drop");
    }
}

pub struct Fixture {
    pub manager: PluginManager,
    pub journal: Journal,
}

impl Fixture {
    pub fn id(&self, name: &str) -> SpecId {
        self.manager.plugin_id(name).expect("plugin exists")
    }

    pub fn calls(&self, call: &str) -> Vec<String> {
        let prefix = format!("{}:", call);
        self.journal
            .lock()
            .iter()
            .filter_map(|entry| entry.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    pub fn queue_names(&mut self) -> Vec<String> {
        let queue = self.manager.load_queue();
        queue.iter().map(|id| self.manager.spec(*id).name().to_string()).collect()
    }
}

/// Register every record with a [`StaticLoader`]
pub fn static_loader(plugins: Vec<(Value, Behavior)>, journal: &Journal) -> StaticLoader {
    let loader = StaticLoader::new();
    for (record, behavior) in plugins {
        let name = record["MetaData"]["Name"].as_str().unwrap_or_default().to_string();
        let journal = journal.clone();
        let plugin_name = name.clone();
        loader.register(&name, record, move || TestPlugin {
            name: plugin_name.clone(),
            journal: journal.clone(),
            behavior: behavior.clone(),
        });
    }
    loader
}

/// A manager without crash checking that has discovered `plugins`
pub fn fixture(plugins: Vec<(Value, Behavior)>) -> Fixture {
    fixture_with(plugins, |_| {})
}

/// Like [`fixture`], with `configure` run before discovery
pub fn fixture_with(plugins: Vec<(Value, Behavior)>, configure: impl FnOnce(&mut PluginManager)) -> Fixture {
    let journal = Journal::default();
    let mut manager = PluginManager::new();
    manager.set_crash_check_enabled(false);
    manager.add_loader(Box::new(static_loader(plugins, &journal)));
    configure(&mut manager);
    manager.set_plugin_paths(Vec::new()).expect("static discovery cannot fail");
    Fixture { manager, journal }
}

pub fn plain(record: Value) -> (Value, Behavior) {
    (record, Behavior::default())
}
