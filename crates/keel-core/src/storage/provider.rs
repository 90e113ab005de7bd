use std::fmt::Debug;
use std::path::Path;

use crate::kernel::error::Result;

/// Where host configuration and settings documents live.
///
/// Implementations decide how a path maps onto real storage. Writes must
/// never leave a half-written document behind: a crash mid-write keeps the
/// previous settings readable.
pub trait StorageProvider: Send + Sync + Debug {
    /// Short name used in log messages
    fn name(&self) -> &str;

    fn exists(&self, path: &Path) -> bool;

    /// Whole document as text; [`NotFound`](crate::storage::error::StorageSystemError::NotFound)
    /// if there is none
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Replace the document at `path`, creating missing directories
    fn write_string(&self, path: &Path, contents: &str) -> Result<()>;
}
