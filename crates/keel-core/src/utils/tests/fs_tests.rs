#![cfg(test)]

use std::fs::{self, File};
use std::path::Path;

use tempfile::tempdir;

use crate::utils::fs::{find_files, find_libraries, is_library_file};

#[test]
fn test_find_files_recurses_with_predicate() {
    let temp_dir = tempdir().unwrap();
    let base_path = temp_dir.path();

    let sub_dir = base_path.join("sub");
    fs::create_dir_all(&sub_dir).unwrap();
    File::create(base_path.join("libone.so")).unwrap();
    File::create(base_path.join("notes.log")).unwrap();
    File::create(sub_dir.join("two.DLL")).unwrap();

    let found = find_files(base_path, &is_library_file).unwrap();
    assert_eq!(found, vec![base_path.join("libone.so"), sub_dir.join("two.DLL")]);

    let single = find_files(&base_path.join("notes.log"), &|_: &Path| true).unwrap();
    assert_eq!(single, vec![base_path.join("notes.log")]);
}

#[test]
fn test_find_files_missing_directory_is_empty() {
    let temp_dir = tempdir().unwrap();
    let missing = temp_dir.path().join("nope");
    let found = find_files(&missing, &|_: &Path| true).unwrap();
    assert!(found.is_empty());
}

#[test]
fn test_find_files_is_sorted() {
    let temp_dir = tempdir().unwrap();
    let base_path = temp_dir.path();
    for name in ["c.so", "a.so", "b.so"] {
        File::create(base_path.join(name)).unwrap();
    }
    let found = find_files(base_path, &|_: &Path| true).unwrap();
    let names: Vec<_> = found
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["a.so", "b.so", "c.so"]);
}

#[test]
fn test_is_library_file() {
    assert!(is_library_file(Path::new("/opt/plugins/libeditor.so")));
    assert!(is_library_file(Path::new("Editor.DLL")));
    assert!(is_library_file(Path::new("libeditor.dylib")));
    assert!(!is_library_file(Path::new("editor.json")));
    assert!(!is_library_file(Path::new("README")));
}

#[test]
fn test_find_libraries_across_paths() {
    let first = tempdir().unwrap();
    let second = tempdir().unwrap();
    File::create(first.path().join("liba.so")).unwrap();
    File::create(first.path().join("notes.txt")).unwrap();
    fs::create_dir_all(second.path().join("nested")).unwrap();
    File::create(second.path().join("nested").join("libb.so")).unwrap();

    let found = find_libraries(&[first.path().to_path_buf(), second.path().to_path_buf()]).unwrap();
    assert_eq!(found, vec![first.path().join("liba.so"), second.path().join("nested").join("libb.so")]);
}
