//! # keel-core
//!
//! Plugin discovery, dependency resolution and lifecycle engine.
//!
//! A host creates a [`PluginManager`], registers one or more
//! [loaders](plugin_system::PluginLoader), points it at settings and plugin
//! directories, and then drives discovery, loading, delayed initialization
//! and shutdown. Plugins find each other's services through the shared
//! [`ObjectPool`].
pub mod event;
pub mod kernel;
pub mod object_pool;
pub mod plugin_system;
pub mod storage;
pub mod utils;

// Re-export key public types/traits for easier use by the binary and plugins
pub use event::{Event, EventDispatcher, PluginEvent, SharedEventDispatcher};
pub use kernel::error::{Error, Result};
pub use object_pool::{AggregateRegistry, ObjectPool, PoolObject};
pub use plugin_system::{Plugin, PluginContext, PluginManager, PluginSpec, PluginState, StaticLoader};
pub use storage::{HostConfig, SettingsStore, StorageProvider};
