//! Persisted processed-entry ledgers.
//!
//! The file ledger is newline-delimited, one entry key per line. Blank lines
//! and lines starting with `#` are ignored on load. Saves replace the whole
//! file atomically (temp sibling, fsync, rename, parent fsync).

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use super::EntryKey;
use crate::errors::ResumeError;
use crate::platform;

/// Where a resume filter's record comes from and goes back to.
pub trait ResumeStore: Send + Sync {
    fn load(&self) -> Result<Vec<EntryKey>, ResumeError>;
    fn save(&self, processed: &BTreeSet<EntryKey>) -> Result<(), ResumeError>;
}

/// In-memory ledger; survives filter restarts within one process only.
#[derive(Debug, Default)]
pub struct TransientResumeStore {
    entries: Mutex<BTreeSet<EntryKey>>,
}

impl TransientResumeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<EntryKey>,
    {
        Self {
            entries: Mutex::new(entries.into_iter().map(Into::into).collect()),
        }
    }
}

impl ResumeStore for TransientResumeStore {
    fn load(&self) -> Result<Vec<EntryKey>, ResumeError> {
        let entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        Ok(entries.iter().cloned().collect())
    }

    fn save(&self, processed: &BTreeSet<EntryKey>) -> Result<(), ResumeError> {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.clone_from(processed);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FileResumeStore {
    path: PathBuf,
}

impl FileResumeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn err(&self, op: &'static str) -> impl FnOnce(io::Error) -> ResumeError + '_ {
        move |source: io::Error| ResumeError::Ledger {
            op,
            path: self.path.clone(),
            source,
        }
    }
}

impl ResumeStore for FileResumeStore {
    fn load(&self) -> Result<Vec<EntryKey>, ResumeError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no resume ledger yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(self.err("read")(e)),
        };
        let keys: Vec<EntryKey> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(EntryKey::from)
            .collect();
        debug!(path = %self.path.display(), entries = keys.len(), "loaded resume ledger");
        Ok(keys)
    }

    fn save(&self, processed: &BTreeSet<EntryKey>) -> Result<(), ResumeError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(self.err("create ledger directory"))?;
        }
        let mut body = String::new();
        for key in processed {
            body.push_str(key.as_str());
            body.push('\n');
        }
        platform::atomic_write(&self.path, body.as_bytes()).map_err(self.err("write"))?;
        debug!(path = %self.path.display(), entries = processed.len(), "saved resume ledger");
        Ok(())
    }
}
