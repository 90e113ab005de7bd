#![cfg(test)]

use std::path::Path;
use std::sync::Arc;

use tempfile::tempdir;

use crate::kernel::constants::{SETTINGS_FORCE_ENABLED_PLUGINS, SETTINGS_IGNORED_PLUGINS};
use crate::kernel::error::Result;
use crate::storage::local::LocalStorageProvider;
use crate::storage::provider::StorageProvider;
use crate::storage::settings::{FileSettings, MemorySettings, SettingsStore};

fn provider_in(dir: &Path) -> Arc<dyn StorageProvider> {
    Arc::new(LocalStorageProvider::new(dir.to_path_buf()))
}

#[test]
fn test_memory_settings_round_trip() {
    let mut settings = MemorySettings::new();
    assert!(settings.string_list(SETTINGS_IGNORED_PLUGINS).is_empty());
    assert!(settings.file_name().is_none());

    settings.set_string_list(SETTINGS_IGNORED_PLUGINS, vec!["Foo".to_string()]);
    assert_eq!(settings.string_list(SETTINGS_IGNORED_PLUGINS), vec!["Foo"]);
    assert!(settings.sync().is_ok());
}

#[test]
fn test_memory_settings_file_name() {
    let settings = MemorySettings::with_file_name("/tmp/keel/settings.json");
    assert_eq!(settings.file_name(), Some(Path::new("/tmp/keel/settings.json")));
}

#[test]
fn test_file_settings_missing_file_is_empty() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let settings = FileSettings::open(provider_in(temp_dir.path()), "settings.json")?;

    assert!(settings.string_list(SETTINGS_FORCE_ENABLED_PLUGINS).is_empty());
    assert_eq!(settings.file_name(), Some(Path::new("settings.json")));
    Ok(())
}

#[test]
fn test_file_settings_persist_on_sync() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let path = temp_dir.path().join("config").join("settings.json");

    let mut settings = FileSettings::open(provider_in(temp_dir.path()), path.clone())?;
    settings.set_string_list(SETTINGS_IGNORED_PLUGINS, vec!["Foo".to_string(), "Bar".to_string()]);
    assert!(!path.exists(), "nothing is written before sync");
    settings.sync()?;
    assert!(path.exists());

    let reopened = FileSettings::open(provider_in(temp_dir.path()), path)?;
    assert_eq!(reopened.string_list(SETTINGS_IGNORED_PLUGINS), vec!["Foo", "Bar"]);
    assert!(reopened.string_list(SETTINGS_FORCE_ENABLED_PLUGINS).is_empty());
    Ok(())
}

#[test]
fn test_file_settings_reads_existing_document() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    std::fs::write(
        temp_dir.path().join("install.json"),
        r#"{ "Plugins/ForceEnabled": ["Experimental"], "Unrelated": 3 }"#,
    )
    .expect("write fixture");

    let settings = FileSettings::open(provider_in(temp_dir.path()), "install.json")?;
    assert_eq!(settings.string_list(SETTINGS_FORCE_ENABLED_PLUGINS), vec!["Experimental"]);
    // Values of another type read as empty
    assert!(settings.string_list("Unrelated").is_empty());
    Ok(())
}

#[test]
fn test_file_settings_rejects_unknown_extension() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    assert!(FileSettings::open(provider_in(temp_dir.path()), "settings.ini").is_err());
}
