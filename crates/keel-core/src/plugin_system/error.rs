//! # Keel Plugin System Errors
//!
//! Host-level failures of the plugin system.
//!
//! A plugin that fails to load is not an error in this sense: its failure is
//! recorded on its [`PluginSpec`](crate::plugin_system::PluginSpec) and the
//! rest of the system carries on. [`PluginSystemError`] covers the cases where
//! the host itself cannot proceed.
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum PluginSystemError {
    /// A loader could not list its candidates
    #[error("Loader '{loader}' could not scan '{}': {message}", path.display())]
    ScanFailed {
        loader: String,
        path: PathBuf,
        message: String,
    },

    #[error("Shutdown signal channel closed while {pending} plugin(s) were still stopping")]
    ShutdownInterrupted { pending: usize },
}
