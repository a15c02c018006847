//! Typed error definitions for file_store.
//! Every I/O failure carries the operation and the path it was acting on, so
//! callers never have to inspect a bare `io::Error`.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used by the store pipeline.
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("File already exists: {0}. Cannot write new file.")]
    Conflict(PathBuf),

    #[error("Cannot store file {path}: {op} failed: {source}")]
    WriteIo {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot create directory {path}: {source}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot write null body to file: {0}")]
    NullPayload(PathBuf),

    #[error("Cannot apply permissions {mode:o} to {path}: {source}")]
    MetadataApply {
        path: PathBuf,
        mode: u32,
        #[source]
        source: io::Error,
    },

    #[error("Cannot move existing file {path} out of the way: {source}")]
    MoveExisting {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Unsupported charset: {0}")]
    UnsupportedCharset(String),

    #[error("Invalid permission notation '{0}': expected rwxrwxrwx or octal")]
    InvalidPermissions(String),
}

impl StoreError {
    /// True when the error came from a refused write against an existing target.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// Errors raised by the resume filter and its persisted ledger.
#[derive(Debug, Error)]
pub enum ResumeError {
    #[error("resume already performed; filter is active")]
    AlreadyActive,

    #[error("resume ledger {path}: {op} failed: {source}")]
    Ledger {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
