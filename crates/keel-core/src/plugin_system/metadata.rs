//! Reading the metadata record embedded in every plugin.
//!
//! The record is a JSON object of the form
//!
//! ```json
//! { "IID": "org.keel.Plugin",
//!   "MetaData": { "Name": "TextEditor", "Version": "1.2.0", ... } }
//! ```
//!
//! Records with a missing or foreign `IID` are not plugins and are skipped
//! without error. Everything under `MetaData` is validated key by key; the
//! first violation is reported and reading stops there.
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::plugin_system::dependency::{DependencyKind, PluginArgumentDescription, PluginDependency};
use crate::plugin_system::version::is_valid_version;

pub const KEY_IID: &str = "IID";
pub const KEY_METADATA: &str = "MetaData";
pub const KEY_NAME: &str = "Name";
pub const KEY_VERSION: &str = "Version";
pub const KEY_COMPAT_VERSION: &str = "CompatVersion";
pub const KEY_REQUIRED: &str = "Required";
pub const KEY_EXPERIMENTAL: &str = "Experimental";
pub const KEY_DISABLED_BY_DEFAULT: &str = "DisabledByDefault";
pub const KEY_VENDOR: &str = "Vendor";
pub const KEY_COPYRIGHT: &str = "Copyright";
pub const KEY_LICENSE: &str = "License";
pub const KEY_DESCRIPTION: &str = "Description";
pub const KEY_URL: &str = "Url";
pub const KEY_CATEGORY: &str = "Category";
pub const KEY_PLATFORM: &str = "Platform";
pub const KEY_DEPENDENCIES: &str = "Dependencies";
pub const KEY_DEPENDENCY_TYPE: &str = "Type";
pub const KEY_ARGUMENTS: &str = "Arguments";
pub const KEY_ARGUMENT_PARAMETER: &str = "Parameter";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    #[error("Plugin meta data not found")]
    NotFound,

    #[error("\"{0}\" is missing")]
    Missing(&'static str),

    #[error("Value for key \"{0}\" is not a string")]
    NotAString(&'static str),

    #[error("Value for key \"{0}\" is not a bool")]
    NotABool(&'static str),

    #[error("Value for key \"{0}\" is not an array of objects")]
    NotAnObjectArray(&'static str),

    #[error("Value for key \"{0}\" is not a string and not an array of strings")]
    NotAMultilineString(&'static str),

    #[error("Value \"{value}\" for key \"{key}\" has invalid format")]
    InvalidFormat { key: &'static str, value: String },

    #[error("Invalid platform specification \"{pattern}\": {reason}")]
    InvalidPlatform { pattern: String, reason: String },

    #[error("\"Type\" must be \"required\" or \"optional\" (is \"{0}\").")]
    InvalidDependencyType(String),

    #[error("\"Name\" is empty")]
    EmptyArgumentName,

    #[error("Dependency: {0}")]
    Dependency(Box<MetadataError>),

    #[error("Argument: {0}")]
    Argument(Box<MetadataError>),
}

impl MetadataError {
    fn in_dependency(self) -> Self {
        MetadataError::Dependency(Box::new(self))
    }

    fn in_argument(self) -> Self {
        MetadataError::Argument(Box::new(self))
    }
}

/// Validated contents of a plugin's `MetaData` object.
#[derive(Debug, Clone, Default)]
pub struct PluginMetaData {
    pub name: String,
    pub version: String,
    pub compat_version: String,
    pub vendor: String,
    pub copyright: String,
    pub license: String,
    pub description: String,
    pub url: String,
    pub category: String,
    /// Restricts the plugin to hosts whose platform name matches
    pub platform: Option<Regex>,
    pub required: bool,
    pub experimental: bool,
    pub disabled_by_default: bool,
    pub dependencies: Vec<PluginDependency>,
    pub arguments: Vec<PluginArgumentDescription>,
    /// The `MetaData` object as it was found
    pub raw: Map<String, Value>,
}

impl PluginMetaData {
    /// Read `record` into `self`.
    ///
    /// Returns `Ok(false)` when the record is not a plugin for interface
    /// `iid`. On error, fields read before the failing key keep their values
    /// so the failure can still be attributed to a plugin name.
    pub fn read(&mut self, record: &Value, iid: &str) -> Result<bool, MetadataError> {
        match record.get(KEY_IID) {
            Some(Value::String(found)) if found == iid => {}
            Some(Value::String(_)) => {
                log::debug!("Plugin ignored (IID does not match)");
                return Ok(false);
            }
            _ => {
                log::debug!("Not a plugin (no string IID found)");
                return Ok(false);
            }
        }

        let Some(Value::Object(metadata)) = record.get(KEY_METADATA) else {
            return Err(MetadataError::NotFound);
        };
        self.raw = metadata.clone();

        self.name = match metadata.get(KEY_NAME) {
            None => return Err(MetadataError::Missing(KEY_NAME)),
            Some(value) => value.as_str().ok_or(MetadataError::NotAString(KEY_NAME))?.to_string(),
        };

        self.version = match metadata.get(KEY_VERSION) {
            None => return Err(MetadataError::Missing(KEY_VERSION)),
            Some(value) => value.as_str().ok_or(MetadataError::NotAString(KEY_VERSION))?.to_string(),
        };
        if !is_valid_version(&self.version) {
            return Err(MetadataError::InvalidFormat {
                key: KEY_VERSION,
                value: self.version.clone(),
            });
        }

        self.compat_version = match optional_string(metadata, KEY_COMPAT_VERSION)? {
            Some(compat) => {
                if !is_valid_version(&compat) {
                    return Err(MetadataError::InvalidFormat {
                        key: KEY_COMPAT_VERSION,
                        value: compat,
                    });
                }
                compat
            }
            None => self.version.clone(),
        };

        self.required = optional_bool(metadata, KEY_REQUIRED)?;
        self.experimental = optional_bool(metadata, KEY_EXPERIMENTAL)?;
        self.disabled_by_default = optional_bool(metadata, KEY_DISABLED_BY_DEFAULT)?;
        log::debug!(
            "{}: required = {}, experimental = {}, disabled by default = {}",
            self.name,
            self.required,
            self.experimental,
            self.disabled_by_default
        );

        self.vendor = optional_string(metadata, KEY_VENDOR)?.unwrap_or_default();
        self.copyright = optional_string(metadata, KEY_COPYRIGHT)?.unwrap_or_default();
        if let Some(value) = metadata.get(KEY_DESCRIPTION) {
            self.description = multiline_string(value).ok_or(MetadataError::NotAString(KEY_DESCRIPTION))?;
        }
        self.url = optional_string(metadata, KEY_URL)?.unwrap_or_default();
        self.category = optional_string(metadata, KEY_CATEGORY)?.unwrap_or_default();
        if let Some(value) = metadata.get(KEY_LICENSE) {
            self.license = multiline_string(value).ok_or(MetadataError::NotAMultilineString(KEY_LICENSE))?;
        }

        let platform = optional_string(metadata, KEY_PLATFORM)?.unwrap_or_default();
        let platform = platform.trim();
        if !platform.is_empty() {
            let pattern = Regex::new(platform).map_err(|e| MetadataError::InvalidPlatform {
                pattern: platform.to_string(),
                reason: e.to_string(),
            })?;
            self.platform = Some(pattern);
        }

        if let Some(value) = metadata.get(KEY_DEPENDENCIES) {
            for entry in object_array(value, KEY_DEPENDENCIES)? {
                let dependency = read_dependency(entry).map_err(MetadataError::in_dependency)?;
                self.dependencies.push(dependency);
            }
        }

        if let Some(value) = metadata.get(KEY_ARGUMENTS) {
            for entry in object_array(value, KEY_ARGUMENTS)? {
                let argument = read_argument(entry).map_err(MetadataError::in_argument)?;
                log::debug!(
                    "Argument: {} Parameter: {} Description: {}",
                    argument.name,
                    argument.parameter,
                    argument.description
                );
                self.arguments.push(argument);
            }
        }

        Ok(true)
    }
}

fn optional_string(object: &Map<String, Value>, key: &'static str) -> Result<Option<String>, MetadataError> {
    match object.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(MetadataError::NotAString(key)),
    }
}

fn optional_bool(object: &Map<String, Value>, key: &'static str) -> Result<bool, MetadataError> {
    match object.get(key) {
        None => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(MetadataError::NotABool(key)),
    }
}

/// A string, or an array of strings joined with newlines
fn multiline_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(lines) => lines
            .iter()
            .map(|line| line.as_str())
            .collect::<Option<Vec<_>>>()
            .map(|lines| lines.join("\n")),
        _ => None,
    }
}

fn object_array<'a>(value: &'a Value, key: &'static str) -> Result<Vec<&'a Map<String, Value>>, MetadataError> {
    let array = value.as_array().ok_or(MetadataError::NotAnObjectArray(key))?;
    array
        .iter()
        .map(|entry| entry.as_object().ok_or(MetadataError::NotAnObjectArray(key)))
        .collect()
}

fn read_dependency(object: &Map<String, Value>) -> Result<PluginDependency, MetadataError> {
    let name = match object.get(KEY_NAME) {
        None => return Err(MetadataError::Missing(KEY_NAME)),
        Some(value) => value.as_str().ok_or(MetadataError::NotAString(KEY_NAME))?.to_string(),
    };
    let version = optional_string(object, KEY_VERSION)?.unwrap_or_default();
    if !is_valid_version(&version) {
        return Err(MetadataError::InvalidFormat {
            key: KEY_VERSION,
            value: version,
        });
    }
    let kind = match optional_string(object, KEY_DEPENDENCY_TYPE)? {
        None => DependencyKind::Required,
        Some(kind) => DependencyKind::parse(&kind).ok_or(MetadataError::InvalidDependencyType(kind))?,
    };
    Ok(PluginDependency::new(name, version, kind))
}

fn read_argument(object: &Map<String, Value>) -> Result<PluginArgumentDescription, MetadataError> {
    let name = match object.get(KEY_NAME) {
        None => return Err(MetadataError::Missing(KEY_NAME)),
        Some(value) => value.as_str().ok_or(MetadataError::NotAString(KEY_NAME))?.to_string(),
    };
    if name.is_empty() {
        return Err(MetadataError::EmptyArgumentName);
    }
    Ok(PluginArgumentDescription {
        name,
        description: optional_string(object, KEY_DESCRIPTION)?.unwrap_or_default(),
        parameter: optional_string(object, KEY_ARGUMENT_PARAMETER)?.unwrap_or_default(),
    })
}
