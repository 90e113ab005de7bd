//! The `Core` plugin compiled into the host.
//!
//! Every other plugin may depend on it; the host refuses to start without it.
use std::sync::Arc;

use keel_core::kernel::constants::{APP_VERSION, CORE_PLUGIN_NAME, DEFAULT_PLUGIN_IID};
use keel_core::plugin_system::{Plugin, PluginContext, PluginTest, ShutdownFlag};
use keel_core::utils::platform_name;
use keel_core::{PoolObject, StaticLoader};
use serde_json::{Value, json};

pub const COPYRIGHT: &str = "Copyright (C) The Keel Developers";

/// Name of the pool object carrying the host platform description
pub const PLATFORM_OBJECT: &str = "Core.Platform";

const LIST_OBJECTS_OPTION: &str = "-list-objects";

pub fn metadata() -> Value {
    json!({
        "IID": DEFAULT_PLUGIN_IID,
        "MetaData": {
            "Name": CORE_PLUGIN_NAME,
            "Version": APP_VERSION,
            "CompatVersion": APP_VERSION,
            "Required": true,
            "Vendor": "The Keel Developers",
            "Copyright": COPYRIGHT,
            "Category": "Core",
            "Description": "The core plugin for Keel",
            "Arguments": [
                {
                    "Name": LIST_OBJECTS_OPTION,
                    "Description": "List the objects in the object pool once startup is complete"
                }
            ]
        }
    })
}

/// Register the core plugin with `loader`
pub fn register(loader: &StaticLoader) {
    loader.register(CORE_PLUGIN_NAME, metadata(), CorePlugin::default);
}

#[derive(Default)]
pub struct CorePlugin {
    list_objects: bool,
    platform: Option<Arc<PoolObject>>,
}

impl Plugin for CorePlugin {
    fn initialize(&mut self, ctx: &PluginContext<'_>, arguments: &[String]) -> Result<(), String> {
        self.list_objects = arguments.iter().any(|a| a == LIST_OBJECTS_OPTION);

        let platform = PoolObject::from_value(PLATFORM_OBJECT, platform_name());
        if !ctx.pool().add_object(&platform) {
            return Err(format!("Cannot publish {}", PLATFORM_OBJECT));
        }
        self.platform = Some(platform);
        log::info!("Running on {}", platform_name());
        Ok(())
    }

    fn extensions_initialized(&mut self, _ctx: &PluginContext<'_>) {}

    fn delayed_initialize(&mut self, ctx: &PluginContext<'_>) -> bool {
        if self.list_objects {
            for object in ctx.pool().all_objects() {
                println!("{}", object.name());
            }
        }
        false
    }

    fn about_to_shutdown(&mut self, ctx: &PluginContext<'_>) -> ShutdownFlag {
        if let Some(platform) = self.platform.take() {
            ctx.pool().remove_object(&platform);
        }
        ShutdownFlag::Synchronous
    }

    fn tests(&self) -> Vec<PluginTest> {
        let published = self.platform.clone();
        vec![
            PluginTest::new("testPlatformName", || {
                if platform_name().contains('(') {
                    Ok(())
                } else {
                    Err(format!("unexpected platform name '{}'", platform_name()))
                }
            }),
            PluginTest::new("testPlatformObject", move || match &published {
                Some(object) if object.query::<String>().is_some() => Ok(()),
                Some(_) => Err("platform object has no String capability".to_string()),
                None => Err("platform object was not published".to_string()),
            }),
        ]
    }
}
