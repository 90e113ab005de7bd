use std::any::Any;
use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::event::SharedEventDispatcher;
use crate::object_pool::ObjectPool;

/// What a plugin reports from [`Plugin::about_to_shutdown`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownFlag {
    /// Nothing left to do once `about_to_shutdown` returns
    #[default]
    Synchronous,
    /// The plugin finishes later by signalling its [`ShutdownSignal`]
    Asynchronous,
}

/// Completion handle for an asynchronous shutdown.
///
/// Calling [`finish`](Self::finish) (or dropping the handle) tells the
/// manager that the plugin is done; shutdown proceeds to deleting plugins
/// once every asynchronous plugin has signalled.
pub struct ShutdownSignal {
    plugin_name: String,
    sender: Option<UnboundedSender<String>>,
}

impl ShutdownSignal {
    pub(crate) fn new(plugin_name: &str, sender: UnboundedSender<String>) -> Self {
        Self {
            plugin_name: plugin_name.to_string(),
            sender: Some(sender),
        }
    }

    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    pub fn finish(mut self) {
        self.send();
    }

    fn send(&mut self) {
        if let Some(sender) = self.sender.take() {
            // The receiver only goes away together with the manager.
            let _ = sender.send(self.plugin_name.clone());
        }
    }
}

impl Drop for ShutdownSignal {
    fn drop(&mut self) {
        self.send();
    }
}

impl fmt::Debug for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownSignal")
            .field("plugin_name", &self.plugin_name)
            .field("finished", &self.sender.is_none())
            .finish()
    }
}

/// What a plugin sees of the host while one of its lifecycle methods runs
pub struct PluginContext<'a> {
    plugin_name: &'a str,
    pool: &'a Arc<ObjectPool>,
    shutdown: &'a UnboundedSender<String>,
}

impl<'a> PluginContext<'a> {
    pub(crate) fn new(plugin_name: &'a str, pool: &'a Arc<ObjectPool>, shutdown: &'a UnboundedSender<String>) -> Self {
        Self {
            plugin_name,
            pool,
            shutdown,
        }
    }

    /// Name of the plugin being called
    pub fn plugin_name(&self) -> &str {
        self.plugin_name
    }

    pub fn pool(&self) -> &Arc<ObjectPool> {
        self.pool
    }

    pub fn events(&self) -> &SharedEventDispatcher {
        self.pool.events()
    }

    /// Handle to signal the end of an asynchronous shutdown.
    ///
    /// Take it in `about_to_shutdown` before returning
    /// [`ShutdownFlag::Asynchronous`].
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        ShutdownSignal::new(self.plugin_name, self.shutdown.clone())
    }
}

/// A named self-test a plugin exposes for `-test` runs
pub struct PluginTest {
    pub name: String,
    run: Box<dyn Fn() -> Result<(), String> + Send + Sync>,
}

impl PluginTest {
    pub fn new(name: impl Into<String>, run: impl Fn() -> Result<(), String> + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            run: Box::new(run),
        }
    }

    pub fn run(&self) -> Result<(), String> {
        (self.run)()
    }
}

impl fmt::Debug for PluginTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginTest").field("name", &self.name).finish_non_exhaustive()
    }
}

/// The lifecycle contract every plugin implements.
///
/// The manager calls these methods from a single thread, one plugin at a
/// time, in load-queue order:
///
/// 1. `initialize` for dependencies before dependents
/// 2. `extensions_initialized` for dependents before dependencies
/// 3. `delayed_initialize`, spread over event-loop ticks
/// 4. `about_to_shutdown` for dependents before dependencies
///
/// A panic inside any of these is caught and recorded as the plugin's error.
pub trait Plugin: Send + Sync {
    /// Set up the plugin. Dependencies are already initialized.
    ///
    /// `arguments` are the command-line options attributed to this plugin.
    fn initialize(&mut self, ctx: &PluginContext<'_>, arguments: &[String]) -> Result<(), String>;

    /// Every plugin depending on this one has been initialized.
    fn extensions_initialized(&mut self, ctx: &PluginContext<'_>);

    /// Deferred work, run after startup. Return `true` to yield to the
    /// event loop before the next plugin's delayed initialization.
    fn delayed_initialize(&mut self, _ctx: &PluginContext<'_>) -> bool {
        false
    }

    fn about_to_shutdown(&mut self, _ctx: &PluginContext<'_>) -> ShutdownFlag {
        ShutdownFlag::Synchronous
    }

    /// Handle options forwarded from another instance of the host.
    fn remote_command(
        &mut self,
        _options: &[String],
        _working_directory: &str,
        _arguments: &[String],
    ) -> Option<Box<dyn Any + Send>> {
        None
    }

    fn tests(&self) -> Vec<PluginTest> {
        Vec::new()
    }
}
