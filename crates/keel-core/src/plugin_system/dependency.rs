use std::fmt;

use serde::Serialize;

/// How strongly a plugin depends on another
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum DependencyKind {
    /// Must be present and loaded before the dependent
    #[default]
    Required,
    /// Used when available, silently skipped otherwise
    Optional,
    /// Only needed when the dependent's tests are run
    Test,
}

impl DependencyKind {
    /// Parse the metadata `Type` value, case-insensitively
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "required" => Some(DependencyKind::Required),
            "optional" => Some(DependencyKind::Optional),
            "test" => Some(DependencyKind::Test),
            _ => None,
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyKind::Required => write!(f, "required"),
            DependencyKind::Optional => write!(f, "optional"),
            DependencyKind::Test => write!(f, "test"),
        }
    }
}

/// A declared dependency on another plugin.
///
/// `version` is the minimum version the dependency must be compatible with:
/// it is satisfied by any spec whose `compat_version <= version <= spec version`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PluginDependency {
    pub name: String,
    pub version: String,
    pub kind: DependencyKind,
}

impl PluginDependency {
    pub fn new(name: impl Into<String>, version: impl Into<String>, kind: DependencyKind) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            kind,
        }
    }

    pub fn required(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self::new(name, version, DependencyKind::Required)
    }

    pub fn optional(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self::new(name, version, DependencyKind::Optional)
    }

    pub fn test(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self::new(name, version, DependencyKind::Test)
    }
}

impl fmt::Display for PluginDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.version)?;
        if self.kind != DependencyKind::Required {
            write!(f, ", {}", self.kind)?;
        }
        Ok(())
    }
}

/// A command-line option a plugin declares in its metadata
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PluginArgumentDescription {
    pub name: String,
    pub parameter: String,
    pub description: String,
}
