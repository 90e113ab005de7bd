//! # Keel Core Plugin System
//!
//! Discovery, dependency resolution and lifecycle management of plugins.
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`version`]**: version strings and their ordering.
//! - **[`dependency`]**: declared dependencies and command-line argument
//!   descriptors.
//! - **[`metadata`]**: validation of the metadata record embedded in a plugin.
//! - **[`spec`]**: [`PluginSpec`], one plugin's metadata, enablement and state
//!   machine.
//! - **[`resolver`]**: dependency resolution, indirect enablement and the
//!   load queue.
//! - **[`traits`]**: the [`Plugin`] contract and the [`PluginContext`] handed
//!   to plugins.
//! - **[`loader`]**: turning locations into metadata and instances, for shared
//!   libraries ([`LibraryLoader`]) and in-process plugins ([`StaticLoader`]).
//! - **[`lock_file`]**: detection of the plugin a previous run crashed in.
//! - **[`options`]**: command-line parsing and help output.
//! - **[`manager`]**: the [`PluginManager`] orchestrating all of the above.
pub mod dependency;
pub mod error;
pub mod loader;
pub mod lock_file;
pub mod manager;
pub mod metadata;
pub mod options;
pub mod profiler;
pub mod resolver;
pub mod spec;
pub mod traits;
pub mod version;

pub use dependency::{DependencyKind, PluginArgumentDescription, PluginDependency};
pub use error::PluginSystemError;
pub use loader::{LibraryLoader, PluginFactory, PluginLoader, StaticLoader};
pub use lock_file::{CrashRecoveryPrompt, DisableProblematicPlugin, KeepProblematicPlugin};
pub use manager::{PluginManager, TestSpec};
pub use metadata::{MetadataError, PluginMetaData};
pub use options::format_option;
pub use spec::{PluginSpec, PluginState, SpecId};
pub use traits::{Plugin, PluginContext, PluginTest, ShutdownFlag, ShutdownSignal};
pub use version::{PluginVersion, compare_versions, is_valid_version};

// Test module declaration
#[cfg(test)]
mod tests;
