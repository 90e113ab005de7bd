#![cfg(test)]

use std::fs;
use std::path::Path;

use tempfile::tempdir;

use crate::plugin_system::lock_file::{
    CrashRecoveryPrompt, DisableProblematicPlugin, KeepProblematicPlugin, LockFile, lock_file_path,
    locked_plugin_name,
};

#[test]
fn test_lock_file_path_depends_on_install_dir() {
    let settings = Path::new("/home/me/.config/keel/settings.json");
    let first = lock_file_path(settings, "Keel", Path::new("/opt/keel"));
    let second = lock_file_path(settings, "Keel", Path::new("/usr/local/keel"));

    assert_ne!(first, second);
    assert_eq!(first, lock_file_path(settings, "Keel", Path::new("/opt/keel")));
    assert_eq!(first.parent(), Some(Path::new("/home/me/.config/keel")));

    let file_name = first.file_name().and_then(|n| n.to_str()).expect("file name");
    assert!(file_name.starts_with("Keel."));
    assert!(file_name.ends_with(".lock"));
    let hash = &file_name["Keel.".len()..file_name.len() - ".lock".len()];
    assert_eq!(hash.len(), 16);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn test_guard_writes_and_removes_the_lock() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("sub").join("Keel.lock");

    {
        let guard = LockFile::acquire(path.clone(), "TextEditor");
        assert_eq!(guard.path(), path.as_path());
        assert_eq!(fs::read_to_string(&path).expect("lock written"), "TextEditor\n");
        assert_eq!(locked_plugin_name(&path).as_deref(), Some("TextEditor"));
    }

    assert!(!path.exists());
    assert_eq!(locked_plugin_name(&path), None);
}

#[test]
fn test_locked_name_is_first_line_trimmed() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("Keel.lock");
    fs::write(&path, "  Foo  \nleftover\n").expect("write");

    assert_eq!(locked_plugin_name(&path).as_deref(), Some("Foo"));
}

#[test]
fn test_builtin_prompts() {
    let dependents = vec!["Bar".to_string()];
    assert!(DisableProblematicPlugin.confirm_disable("Keel", "Foo", &dependents));
    assert!(!KeepProblematicPlugin.confirm_disable("Keel", "Foo", &dependents));
}
