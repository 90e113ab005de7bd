//! # Keel Core Errors
//!
//! [`Error`] gathers the failures of the engine's subsystems so that a host
//! can propagate all of them through one [`Result`] alias.
//!
//! A plugin that fails to load, initialize or shut down is not an `Error`:
//! its problem is recorded on the owning
//! [`PluginSpec`](crate::plugin_system::PluginSpec) and the rest of the
//! plugins carry on.
use std::path::PathBuf;

use thiserror::Error as ThisError;

use crate::event::error::EventSystemError;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::metadata::MetadataError;
use crate::storage::error::StorageSystemError;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("Plugin system error: {0}")]
    PluginSystem(#[from] PluginSystemError),

    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    /// Settings or configuration document could not be read or written
    #[error("Storage system error: {0}")]
    StorageSystem(#[from] StorageSystemError),

    #[error("Event system error: {0}")]
    EventSystem(#[from] EventSystemError),

    /// Command line rejected; the message is shown to the user as is
    #[error("{0}")]
    Options(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// I/O failure on `path` while doing `operation`
    pub fn io(source: std::io::Error, operation: impl Into<String>, path: PathBuf) -> Self {
        StorageSystemError::io(source, operation, path).into()
    }
}
