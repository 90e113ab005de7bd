//! Crash detection between runs.
//!
//! While a plugin moves through a lifecycle phase, a lock file next to the
//! settings file names it. The file is removed when the phase completes, so a
//! lock file found at startup names the plugin that was in flight when the
//! previous run died.
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// Location of the lock file for one installation.
///
/// `<settings dir>/<app name>.<16 hex digits>.lock`, where the digits are the
/// first 8 bytes of the SHA-256 of the install directory, so several
/// installations can share one settings directory.
pub fn lock_file_path(settings_file: &Path, app_name: &str, install_dir: &Path) -> PathBuf {
    let digest = Sha256::digest(install_dir.to_string_lossy().as_bytes());
    let hash: String = digest.iter().take(8).map(|b| format!("{:02x}", b)).collect();
    let dir = settings_file.parent().unwrap_or_else(|| Path::new("."));
    dir.join(format!("{}.{}.lock", app_name, hash))
}

/// Name recorded in a lock file left behind by a previous run
pub fn locked_plugin_name(path: &Path) -> Option<String> {
    if !path.exists() {
        return None;
    }
    match fs::File::open(path) {
        Ok(file) => {
            let mut line = String::new();
            if let Err(e) = BufReader::new(file).read_line(&mut line) {
                log::warn!("Lock file {} exists but is not readable: {}", path.display(), e);
                return None;
            }
            Some(line.trim().to_string())
        }
        Err(e) => {
            log::warn!("Lock file {} exists but is not readable: {}", path.display(), e);
            None
        }
    }
}

/// Names a plugin in the lock file for as long as the guard lives
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
}

impl LockFile {
    pub fn acquire(path: PathBuf, plugin_name: &str) -> Self {
        if let Some(dir) = path.parent() {
            if let Err(e) = fs::create_dir_all(dir) {
                log::debug!("Cannot create directory for lock file {}: {}", path.display(), e);
            }
        }
        if let Err(e) = fs::write(&path, format!("{}\n", plugin_name)) {
            log::debug!("Cannot write lock file {}: {}", path.display(), e);
        }
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Asks whether to disable the plugin that was in flight during a crash
pub trait CrashRecoveryPrompt: Send + Sync {
    /// `dependents` are the plugins that would be disabled along with `plugin`
    fn confirm_disable(&self, app_name: &str, plugin: &str, dependents: &[String]) -> bool;
}

/// Disables the problematic plugin without asking, logging what happens
#[derive(Debug, Default, Clone, Copy)]
pub struct DisableProblematicPlugin;

impl CrashRecoveryPrompt for DisableProblematicPlugin {
    fn confirm_disable(&self, app_name: &str, plugin: &str, dependents: &[String]) -> bool {
        log::warn!(
            "It looks like {} closed because of a problem with the \"{}\" plugin. Disabling it for this session.",
            app_name,
            plugin
        );
        if !dependents.is_empty() {
            log::warn!(
                "The following plugins depend on {} and are also disabled: {}.",
                plugin,
                dependents.join(", ")
            );
        }
        true
    }
}

/// Keeps every plugin enabled
#[derive(Debug, Default, Clone, Copy)]
pub struct KeepProblematicPlugin;

impl CrashRecoveryPrompt for KeepProblematicPlugin {
    fn confirm_disable(&self, _app_name: &str, _plugin: &str, _dependents: &[String]) -> bool {
        false
    }
}
