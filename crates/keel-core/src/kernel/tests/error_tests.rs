#![cfg(test)]

use std::io;
use std::path::PathBuf;

use crate::kernel::error::Error;
use crate::plugin_system::error::PluginSystemError;
use crate::storage::error::StorageSystemError;

#[test]
fn test_io_helper_wraps_storage_error() {
    let err = Error::io(
        io::Error::new(io::ErrorKind::NotFound, "gone"),
        "read_settings",
        PathBuf::from("/tmp/settings.json"),
    );
    match &err {
        Error::StorageSystem(StorageSystemError::Io { operation, path, .. }) => {
            assert_eq!(operation, "read_settings");
            assert_eq!(path, &PathBuf::from("/tmp/settings.json"));
        }
        other => panic!("unexpected variant: {:?}", other),
    }
    let text = err.to_string();
    assert!(text.contains("read_settings"));
    assert!(text.contains("/tmp/settings.json"));
}

#[test]
fn test_plugin_system_error_converts() {
    let err: Error = PluginSystemError::ShutdownInterrupted { pending: 2 }.into();
    assert!(matches!(err, Error::PluginSystem(_)));
    assert!(err.to_string().contains("2 plugin(s)"));
}

#[test]
fn test_options_error_displays_bare_message() {
    let err = Error::Options("Unknown option -frobnicate".to_string());
    assert_eq!(err.to_string(), "Unknown option -frobnicate");
}
