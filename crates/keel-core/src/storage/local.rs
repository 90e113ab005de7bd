use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::kernel::error::{Error, Result};
use crate::storage::error::StorageSystemError;
use crate::storage::provider::StorageProvider;

/// Documents on the local disk.
///
/// Relative paths are taken relative to `root`; absolute ones are used as given.
#[derive(Debug, Clone)]
pub struct LocalStorageProvider {
    root: PathBuf,
}

impl LocalStorageProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn locate(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    /// Directory a temporary sibling of `target` is created in, made on demand
    fn staging_dir(target: &Path) -> Result<PathBuf> {
        let parent = target
            .parent()
            .ok_or_else(|| StorageSystemError::NoParentDirectory(target.to_path_buf()))?;
        if parent.as_os_str().is_empty() {
            return Ok(PathBuf::from("."));
        }
        if !parent.is_dir() {
            fs::create_dir_all(parent).map_err(|e| Error::io(e, "create settings directory", parent.to_path_buf()))?;
        }
        Ok(parent.to_path_buf())
    }
}

impl Default for LocalStorageProvider {
    fn default() -> Self {
        Self::new(".")
    }
}

impl StorageProvider for LocalStorageProvider {
    fn name(&self) -> &str {
        "local"
    }

    fn exists(&self, path: &Path) -> bool {
        self.locate(path).is_file()
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        let target = self.locate(path);
        match fs::read_to_string(&target) {
            Ok(contents) => Ok(contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageSystemError::NotFound(target).into()),
            Err(e) => Err(Error::io(e, "read", target)),
        }
    }

    fn write_string(&self, path: &Path, contents: &str) -> Result<()> {
        let target = self.locate(path);
        // The rename below is only atomic within one filesystem.
        let staging = Self::staging_dir(&target)?;
        let mut staged = NamedTempFile::new_in(&staging).map_err(|e| Error::io(e, "stage", staging))?;
        staged
            .write_all(contents.as_bytes())
            .and_then(|()| staged.as_file().sync_all())
            .map_err(|e| Error::io(e, "write", staged.path().to_path_buf()))?;
        staged
            .persist(&target)
            .map_err(|e| Error::io(e.error, "replace", target.clone()))?;
        log::trace!("Wrote {} bytes to {}", contents.len(), target.display());
        Ok(())
    }
}
