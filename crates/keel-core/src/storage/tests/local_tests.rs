#![cfg(test)]

use std::fs;
use std::path::Path;

use tempfile::tempdir;

use crate::kernel::error::{Error, Result};
use crate::storage::error::StorageSystemError;
use crate::storage::local::LocalStorageProvider;
use crate::storage::provider::StorageProvider;

#[test]
fn test_write_then_read() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let provider = LocalStorageProvider::new(temp_dir.path());

    provider.write_string(Path::new("settings.json"), "{\"a\": 1}")?;
    assert_eq!(provider.read_to_string(Path::new("settings.json"))?, "{\"a\": 1}");
    assert!(provider.exists(Path::new("settings.json")));
    assert_eq!(provider.name(), "local");
    Ok(())
}

#[test]
fn test_write_creates_parent_directories() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let provider = LocalStorageProvider::new(temp_dir.path());

    provider.write_string(Path::new("nested/deeper/settings.json"), "{}")?;

    let on_disk = fs::read_to_string(temp_dir.path().join("nested/deeper/settings.json")).expect("read back");
    assert_eq!(on_disk, "{}");
    Ok(())
}

#[test]
fn test_rewrite_leaves_no_staging_files() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let provider = LocalStorageProvider::new(temp_dir.path());

    provider.write_string(Path::new("settings.json"), "first version, rather long")?;
    provider.write_string(Path::new("settings.json"), "second")?;

    assert_eq!(provider.read_to_string(Path::new("settings.json"))?, "second");
    let entries: Vec<_> = fs::read_dir(temp_dir.path())
        .expect("list temp dir")
        .map(|e| e.expect("entry").file_name())
        .collect();
    assert_eq!(entries, vec!["settings.json"]);
    Ok(())
}

#[test]
fn test_absolute_paths_ignore_root() -> Result<()> {
    let root = tempdir().expect("Failed to create temp directory");
    let other = tempdir().expect("Failed to create temp directory");
    let provider = LocalStorageProvider::new(root.path());

    let absolute = other.path().join("outside.json");
    provider.write_string(&absolute, "outside")?;

    assert!(absolute.exists());
    assert!(!root.path().join("outside.json").exists());
    Ok(())
}

#[test]
fn test_read_missing_document_is_not_found() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let provider = LocalStorageProvider::new(temp_dir.path());

    let err = provider.read_to_string(Path::new("missing.json")).unwrap_err();
    assert!(matches!(err, Error::StorageSystem(StorageSystemError::NotFound(_))));
}

#[test]
fn test_directory_is_not_a_document() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    fs::create_dir(temp_dir.path().join("settings.json")).expect("mkdir");
    let provider = LocalStorageProvider::new(temp_dir.path());

    assert!(!provider.exists(Path::new("settings.json")));
}
