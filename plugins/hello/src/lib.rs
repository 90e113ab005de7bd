//! A plugin built as a shared library.
//!
//! Publishes a [`Greeter`] in the object pool; other plugins find it with
//! `pool.get_object::<Greeter>()`.
use std::sync::Arc;

use keel_core::PoolObject;
use keel_core::plugin_system::{Plugin, PluginContext, PluginTest, ShutdownFlag};

pub const METADATA: &str = include_str!("metadata.json");

const GREETING_OPTION: &str = "-greeting";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeter {
    pub greeting: String,
}

impl Greeter {
    pub fn greet(&self, name: &str) -> String {
        format!("{}, {}!", self.greeting, name)
    }
}

#[derive(Default)]
pub struct HelloPlugin {
    object: Option<Arc<PoolObject>>,
}

/// The option value following `-greeting`, if any
fn greeting_from(arguments: &[String]) -> Option<&str> {
    let position = arguments.iter().position(|a| a == GREETING_OPTION)?;
    arguments.get(position + 1).map(String::as_str)
}

impl Plugin for HelloPlugin {
    fn initialize(&mut self, ctx: &PluginContext<'_>, arguments: &[String]) -> Result<(), String> {
        let greeter = Greeter {
            greeting: greeting_from(arguments).unwrap_or("Hello").to_string(),
        };
        let object = PoolObject::from_value("Hello.Greeter", greeter);
        ctx.pool().add_object(&object);
        self.object = Some(object);
        Ok(())
    }

    fn extensions_initialized(&mut self, _ctx: &PluginContext<'_>) {
        log::debug!("Hello plugin ready");
    }

    fn about_to_shutdown(&mut self, ctx: &PluginContext<'_>) -> ShutdownFlag {
        if let Some(object) = self.object.take() {
            ctx.pool().remove_object(&object);
        }
        ShutdownFlag::Synchronous
    }

    fn tests(&self) -> Vec<PluginTest> {
        let greeter = self.object.as_ref().and_then(|o| o.query::<Greeter>());
        vec![PluginTest::new("testGreeting", move || match &greeter {
            Some(greeter) if greeter.greet("Keel").ends_with(", Keel!") => Ok(()),
            Some(greeter) => Err(format!("unexpected greeting '{}'", greeter.greet("Keel"))),
            None => Err("greeter not published".to_string()),
        })]
    }
}

keel_core::declare_plugin!(METADATA, HelloPlugin::default());

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting_option() {
        let arguments = vec!["-greeting".to_string(), "Howdy".to_string()];
        assert_eq!(greeting_from(&arguments), Some("Howdy"));
        assert_eq!(greeting_from(&[]), None);
        assert_eq!(greeting_from(&["-greeting".to_string()]), None);
    }

    #[test]
    fn test_metadata_is_valid() {
        let record: serde_json::Value = serde_json::from_str(METADATA).expect("valid JSON");
        assert_eq!(record["MetaData"]["Name"], "Hello");
        assert_eq!(record["IID"], keel_core::kernel::constants::DEFAULT_PLUGIN_IID);
    }

    #[test]
    fn test_exported_metadata_symbol() {
        let ptr = keel_plugin_metadata();
        let text = unsafe { std::ffi::CStr::from_ptr(ptr) }.to_str().expect("utf-8");
        assert_eq!(text, METADATA);
    }
}
