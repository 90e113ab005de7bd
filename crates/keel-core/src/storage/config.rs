use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::kernel::constants::{APP_NAME, DEFAULT_PLUGIN_IID, DELAYED_INITIALIZE_INTERVAL_MS};
use crate::kernel::error::{Error, Result};
use crate::storage::error::StorageSystemError;
use crate::storage::provider::StorageProvider;

/// Document formats for configuration and settings files, picked by extension
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigFormat {
    Json,
    #[cfg(feature = "yaml-config")]
    Yaml,
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Canonical extension, also used to name the format in errors
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// `None` for extensions this build has no format for
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(ConfigFormat::Json),
            #[cfg(feature = "yaml-config")]
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            #[cfg(feature = "toml-config")]
            "toml" => Some(ConfigFormat::Toml),
            _ => None,
        }
    }

    /// Like [`from_path`](Self::from_path), but unknown extensions are an error
    pub fn require_from_path(path: &Path) -> Result<Self> {
        Self::from_path(path)
            .ok_or_else(|| StorageSystemError::UnknownFormat(path.display().to_string()).into())
    }

    pub fn serialize<T: Serialize>(&self, value: &T) -> Result<String> {
        let result = match self {
            ConfigFormat::Json => serde_json::to_string_pretty(value).map_err(boxed),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::to_string(value).map_err(boxed),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::to_string_pretty(value).map_err(boxed),
        };
        result.map_err(|source| {
            StorageSystemError::Encode {
                format: self.extension(),
                source,
            }
            .into()
        })
    }

    pub fn deserialize<T: DeserializeOwned>(&self, data: &str) -> Result<T> {
        let result = match self {
            ConfigFormat::Json => serde_json::from_str(data).map_err(boxed),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::from_str(data).map_err(boxed),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(data).map_err(boxed),
        };
        result.map_err(|source| {
            StorageSystemError::Parse {
                format: self.extension(),
                source,
            }
            .into()
        })
    }
}

fn boxed<E: std::error::Error + Send + Sync + 'static>(e: E) -> Box<dyn std::error::Error + Send + Sync> {
    Box::new(e)
}

/// Flat key/value document backing a settings file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigData {
    #[serde(flatten)]
    values: BTreeMap<String, serde_json::Value>,
}

impl ConfigData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value under `key`, `None` if absent or of another type
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<()> {
        let value = serde_json::to_value(value).map_err(|e| {
            Error::from(StorageSystemError::Encode {
                format: "json",
                source: Box::new(e),
            })
        })?;
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    pub fn serialize(&self, format: ConfigFormat) -> Result<String> {
        format.serialize(self)
    }

    pub fn deserialize(data: &str, format: ConfigFormat) -> Result<Self> {
        format.deserialize(data)
    }
}

/// Host configuration, read from an optional config file.
///
/// Every field has a default, so an empty document is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Used in the lock file name and in messages to the user
    pub app_name: String,
    /// Interface identifier plugins must declare
    pub plugin_iid: String,
    /// Directories scanned for plugin libraries
    pub plugin_paths: Vec<PathBuf>,
    /// User settings file
    pub settings_path: Option<PathBuf>,
    /// Installation-wide settings file
    pub install_settings_path: Option<PathBuf>,
    pub crash_check: bool,
    pub delayed_initialize_interval_ms: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            plugin_iid: DEFAULT_PLUGIN_IID.to_string(),
            plugin_paths: Vec::new(),
            settings_path: None,
            install_settings_path: None,
            crash_check: true,
            delayed_initialize_interval_ms: DELAYED_INITIALIZE_INTERVAL_MS,
        }
    }
}

impl HostConfig {
    /// Load from `path`, choosing the format by extension
    pub fn load(provider: &dyn StorageProvider, path: &Path) -> Result<Self> {
        let format = ConfigFormat::require_from_path(path)?;
        let content = provider.read_to_string(path)?;
        let config: HostConfig = format.deserialize(&content)?;
        log::debug!("Loaded host configuration from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, provider: &dyn StorageProvider, path: &Path) -> Result<()> {
        let format = ConfigFormat::require_from_path(path)?;
        provider.write_string(path, &format.serialize(self)?)
    }
}
