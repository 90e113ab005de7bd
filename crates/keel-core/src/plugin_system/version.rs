use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

/// `major[.minor[.patch]][_build]`, every component a decimal integer
static VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]+)(?:[.]([0-9]+))?(?:[.]([0-9]+))?(?:_([0-9]+))?$")
        .expect("version pattern is a valid regex")
});

/// A parsed plugin version. Missing components are zero, so `2.0` and
/// `2.0.0_0` are the same version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PluginVersion {
    components: [u64; 4],
}

impl PluginVersion {
    pub fn new(major: u64, minor: u64, patch: u64, build: u64) -> Self {
        Self {
            components: [major, minor, patch, build],
        }
    }

    pub fn parse(version: &str) -> Option<Self> {
        let captures = VERSION_PATTERN.captures(version)?;
        let mut components = [0u64; 4];
        for (i, component) in components.iter_mut().enumerate() {
            if let Some(m) = captures.get(i + 1) {
                *component = m.as_str().parse().unwrap_or(0);
            }
        }
        Some(Self { components })
    }

    pub fn major(&self) -> u64 {
        self.components[0]
    }

    pub fn minor(&self) -> u64 {
        self.components[1]
    }

    pub fn patch(&self) -> u64 {
        self.components[2]
    }

    pub fn build(&self) -> u64 {
        self.components[3]
    }
}

impl FromStr for PluginVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PluginVersion::parse(s).ok_or_else(|| format!("Invalid version format: {}", s))
    }
}

impl fmt::Display for PluginVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major(), self.minor(), self.patch())?;
        if self.build() != 0 {
            write!(f, "_{}", self.build())?;
        }
        Ok(())
    }
}

/// Whether `version` has the `major[.minor[.patch]][_build]` form
pub fn is_valid_version(version: &str) -> bool {
    VERSION_PATTERN.is_match(version)
}

/// Component-wise comparison of two version strings.
///
/// If either string is not a valid version the two compare as equal. Callers
/// validate versions at metadata-read time, so this only matters for
/// hand-constructed specs.
pub fn compare_versions(version1: &str, version2: &str) -> Ordering {
    match (PluginVersion::parse(version1), PluginVersion::parse(version2)) {
        (Some(v1), Some(v2)) => v1.cmp(&v2),
        _ => Ordering::Equal,
    }
}
