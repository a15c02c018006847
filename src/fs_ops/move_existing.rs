//! Relocating an existing target before a `Move` policy write.
//!
//! The store pipeline only needs "get this file out of the way"; how and
//! where is a pluggable strategy so endpoints can archive elsewhere.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::atomic::{copy_then_delete, try_atomic_move};
use super::util::unique_destination;
use crate::config::StoreConfig;
use crate::errors::{StoreError, StoreResult};

/// Moves an existing target aside. Must succeed before any byte is written.
pub trait MoveExistingStrategy: Send + Sync + fmt::Debug {
    /// Relocate `target`; returns where it went.
    fn move_existing(&self, config: &StoreConfig, target: &Path) -> StoreResult<PathBuf>;
}

/// Default strategy: rename the file into `into` (or beside itself when
/// unset), picking a unique name when the plain name is taken.
#[derive(Debug, Clone, Default)]
pub struct RenameExisting {
    into: Option<PathBuf>,
}

impl RenameExisting {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relocate into `dir`; relative paths resolve against the target's parent.
    pub fn into_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            into: Some(dir.into()),
        }
    }

    fn destination(&self, target: &Path) -> io::Result<PathBuf> {
        let name = target.file_name().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "target has no file name")
        })?;
        let parent = target.parent().unwrap_or_else(|| Path::new("."));
        let dir = match &self.into {
            Some(d) if d.is_absolute() => d.clone(),
            Some(d) => parent.join(d),
            None => parent.to_path_buf(),
        };
        Ok(unique_destination(&dir.join(name)))
    }
}

impl MoveExistingStrategy for RenameExisting {
    fn move_existing(&self, config: &StoreConfig, target: &Path) -> StoreResult<PathBuf> {
        let wrap = |source| StoreError::MoveExisting {
            path: target.to_path_buf(),
            source,
        };
        let dest = self.destination(target).map_err(wrap)?;
        if let Some(dir) = dest.parent() {
            std::fs::create_dir_all(dir).map_err(wrap)?;
        }

        let result = if config.rename_using_copy {
            copy_then_delete(target, &dest)
        } else {
            match try_atomic_move(target, &dest) {
                Ok(()) => Ok(()),
                Err(e) if config.copy_and_delete_on_rename_fail => {
                    debug!(error = %e, src = %target.display(), "rename of existing failed, copying");
                    copy_then_delete(target, &dest)
                }
                Err(e) => return Err(wrap(e)),
            }
        };
        result.map_err(|e| match e {
            StoreError::WriteIo { source, .. } => wrap(source),
            other => other,
        })?;

        info!(src = %target.display(), dest = %dest.display(), "moved existing file aside");
        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConflictPolicy;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn beside_itself_gets_unique_name() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("data.txt");
        fs::write(&target, b"old").unwrap();
        let cfg = StoreConfig::new(dir.path(), ConflictPolicy::Move);
        let moved = RenameExisting::new().move_existing(&cfg, &target).unwrap();
        assert!(!target.exists());
        assert_ne!(moved, target);
        assert_eq!(moved.parent(), target.parent());
        assert_eq!(fs::read(&moved).unwrap(), b"old");
    }

    #[test]
    fn into_relative_archive_dir() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("data.txt");
        fs::write(&target, b"old").unwrap();
        let cfg = StoreConfig::new(dir.path(), ConflictPolicy::Move);
        let moved = RenameExisting::into_dir("archive")
            .move_existing(&cfg, &target)
            .unwrap();
        assert_eq!(moved, dir.path().join("archive").join("data.txt"));
        assert_eq!(fs::read(&moved).unwrap(), b"old");
    }

    #[test]
    fn missing_target_is_move_existing_error() {
        let dir = tempdir().unwrap();
        let mut cfg = StoreConfig::new(dir.path(), ConflictPolicy::Move);
        cfg.copy_and_delete_on_rename_fail = false;
        let err = RenameExisting::new()
            .move_existing(&cfg, &dir.path().join("gone.txt"))
            .unwrap_err();
        assert!(matches!(err, StoreError::MoveExisting { .. }));
    }
}
