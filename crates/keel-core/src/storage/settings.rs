//! String-list settings the plugin manager reads and writes.
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::kernel::error::Result;
use crate::storage::config::{ConfigData, ConfigFormat};
use crate::storage::provider::StorageProvider;

/// A settings store providing string-list values by key
pub trait SettingsStore: Send + Sync + Debug {
    /// Values stored under `key`, empty if unset
    fn string_list(&self, key: &str) -> Vec<String>;

    fn set_string_list(&mut self, key: &str, values: Vec<String>);

    /// Persist pending changes
    fn sync(&mut self) -> Result<()>;

    /// Backing file, if any. The crash lock file lives next to it.
    fn file_name(&self) -> Option<&Path>;
}

/// Settings kept in memory only
#[derive(Debug, Default, Clone)]
pub struct MemorySettings {
    values: BTreeMap<String, Vec<String>>,
    file_name: Option<PathBuf>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend to be backed by `file_name`, which only affects the lock file location
    pub fn with_file_name(file_name: impl Into<PathBuf>) -> Self {
        Self {
            values: BTreeMap::new(),
            file_name: Some(file_name.into()),
        }
    }
}

impl SettingsStore for MemorySettings {
    fn string_list(&self, key: &str) -> Vec<String> {
        self.values.get(key).cloned().unwrap_or_default()
    }

    fn set_string_list(&mut self, key: &str, values: Vec<String>) {
        self.values.insert(key.to_string(), values);
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }

    fn file_name(&self) -> Option<&Path> {
        self.file_name.as_deref()
    }
}

/// Settings persisted as a [`ConfigData`] document.
///
/// The file is read once on open; [`sync`](SettingsStore::sync) writes it
/// back through the provider, which replaces it atomically.
#[derive(Debug)]
pub struct FileSettings {
    provider: Arc<dyn StorageProvider>,
    path: PathBuf,
    format: ConfigFormat,
    data: ConfigData,
    dirty: bool,
}

impl FileSettings {
    /// Open the settings at `path`. A missing file is an empty document.
    pub fn open(provider: Arc<dyn StorageProvider>, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let format = ConfigFormat::require_from_path(&path)?;
        let data = if provider.exists(&path) {
            ConfigData::deserialize(&provider.read_to_string(&path)?, format)?
        } else {
            log::debug!("Settings file {} does not exist yet", path.display());
            ConfigData::new()
        };
        Ok(Self {
            provider,
            path,
            format,
            data,
            dirty: false,
        })
    }

    pub fn data(&self) -> &ConfigData {
        &self.data
    }
}

impl SettingsStore for FileSettings {
    fn string_list(&self, key: &str) -> Vec<String> {
        self.data.get::<Vec<String>>(key).unwrap_or_default()
    }

    fn set_string_list(&mut self, key: &str, values: Vec<String>) {
        match self.data.set(key, values) {
            Ok(()) => self.dirty = true,
            Err(e) => log::warn!("Cannot store setting '{}': {}", key, e),
        }
    }

    fn sync(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let content = self.data.serialize(self.format)?;
        self.provider.write_string(&self.path, &content)?;
        self.dirty = false;
        log::debug!("Wrote settings to {}", self.path.display());
        Ok(())
    }

    fn file_name(&self) -> Option<&Path> {
        Some(&self.path)
    }
}
