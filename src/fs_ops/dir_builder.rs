//! Recursive directory creation, safe under concurrent callers.
//!
//! - One mutex per builder serializes in-process creators of the same tree.
//! - Segments are created one at a time so a configured permission set lands
//!   on each new segment as soon as it exists.
//! - Another process creating a segment first is not an error: the segment is
//!   re-checked and the walk continues when it is a directory.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;
use tracing::trace;

use super::helpers::dir_err;
use super::permissions::PermissionSet;
use crate::errors::{StoreError, StoreResult};

#[derive(Debug, Default)]
pub struct DirectoryBuilder {
    create_lock: Mutex<()>,
}

impl DirectoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure `path` exists as a directory.
    ///
    /// Returns Ok(true) when the directory exists afterwards, Ok(false) when a
    /// segment is occupied by something that is not a directory, and Err for
    /// OS failures (including a failed chmod on a segment we created).
    pub fn ensure_directory(
        &self,
        path: &Path,
        permissions: Option<PermissionSet>,
        absolute: bool,
    ) -> StoreResult<bool> {
        if path.is_dir() {
            return Ok(true);
        }

        // A poisoned lock only means another creator panicked; the guarded
        // state is the filesystem itself, so keep going.
        let _guard = self
            .create_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if path.is_dir() {
            return Ok(true);
        }
        trace!(path = %path.display(), "building directory");
        build_segments(path, permissions.filter(|p| !p.is_empty()), absolute)
    }
}

fn build_segments(path: &Path, perms: Option<PermissionSet>, absolute: bool) -> StoreResult<bool> {
    let mut current = if absolute || path.is_absolute() {
        PathBuf::new()
    } else {
        PathBuf::from(".")
    };

    for component in path.components() {
        match component {
            Component::CurDir => continue,
            Component::Prefix(_) | Component::RootDir | Component::ParentDir => {
                current.push(component.as_os_str());
                continue;
            }
            Component::Normal(part) => current.push(part),
        }

        if current.is_dir() {
            continue;
        }

        match fs::create_dir(&current) {
            Ok(()) => {
                if let Some(p) = perms {
                    trace!(path = %current.display(), mode = %p, "setting chmod on directory");
                    p.apply(&current).map_err(dir_err(&current))?;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                if current.is_dir() {
                    trace!(path = %current.display(), "segment created concurrently");
                    continue;
                }
                trace!(path = %current.display(), "segment exists but is not a directory");
                return Ok(false);
            }
            Err(e) => {
                return Err(StoreError::DirectoryCreation {
                    path: current,
                    source: e,
                });
            }
        }
    }
    Ok(true)
}
