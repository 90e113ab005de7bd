//! # Keel Storage Errors
//!
//! Failures reading or writing configuration and settings documents.
use std::path::PathBuf;

use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum StorageSystemError {
    #[error("I/O error during '{operation}' on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("No such file: {}", .0.display())]
    NotFound(PathBuf),

    /// A value could not be encoded as `format`
    #[error("Cannot write {format} document: {source}")]
    Encode {
        format: &'static str,
        #[source]
        source: BoxedSource,
    },

    /// A document is not valid `format`
    #[error("Cannot parse {format} document: {source}")]
    Parse {
        format: &'static str,
        #[source]
        source: BoxedSource,
    },

    /// The file extension names no configuration format this build supports
    #[error("Unsupported configuration format for '{0}'")]
    UnknownFormat(String),

    #[error("Cannot write '{}': path has no parent directory", .0.display())]
    NoParentDirectory(PathBuf),
}

impl StorageSystemError {
    pub fn io(source: std::io::Error, operation: impl Into<String>, path: PathBuf) -> Self {
        StorageSystemError::Io {
            source,
            operation: operation.into(),
            path,
        }
    }
}
