//! # Keel Storage System
//!
//! File access, configuration documents and the settings store used to
//! persist which plugins are enabled.
pub mod config;
pub mod error;
pub mod local;
pub mod provider;
pub mod settings;

pub use config::{ConfigData, ConfigFormat, HostConfig};
pub use local::LocalStorageProvider;
pub use provider::StorageProvider;
pub use settings::{FileSettings, MemorySettings, SettingsStore};

#[cfg(test)]
mod tests;
