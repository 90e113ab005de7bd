use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Files below `root` accepted by `keep`, depth first in name order.
///
/// A missing `root` yields nothing; a `root` that is a file is tested itself.
pub fn find_files<F>(root: &Path, keep: &F) -> io::Result<Vec<PathBuf>>
where
    F: Fn(&Path) -> bool + ?Sized,
{
    let mut found = Vec::new();
    if root.is_file() {
        if keep(root) {
            found.push(root.to_path_buf());
        }
    } else if root.is_dir() {
        walk(root, keep, &mut found)?;
    }
    Ok(found)
}

fn walk<F>(dir: &Path, keep: &F, found: &mut Vec<PathBuf>) -> io::Result<()>
where
    F: Fn(&Path) -> bool + ?Sized,
{
    let mut children = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()?;
    // read_dir order is filesystem dependent
    children.sort();
    for child in children {
        if child.is_dir() {
            walk(&child, keep, found)?;
        } else if child.is_file() && keep(&child) {
            found.push(child);
        }
    }
    Ok(())
}

/// Whether `path` looks like a dynamic library on any supported host
pub fn is_library_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ["so", "dylib", "dll"].iter().any(|lib| ext.eq_ignore_ascii_case(lib)))
}

/// All dynamic libraries below each of `paths`, in path order
pub fn find_libraries(paths: &[PathBuf]) -> io::Result<Vec<PathBuf>> {
    let mut libraries = Vec::new();
    for path in paths {
        libraries.extend(find_files(path, &is_library_file)?);
    }
    Ok(libraries)
}
