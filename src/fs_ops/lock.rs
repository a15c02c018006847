//! Exclusive read lock on a source file.
//!
//! Design:
//! - The source is opened read-only and an exclusive advisory lock (flock /
//!   LockFileEx via fs2) is held on that handle until the guard drops.
//! - The open handle is exposed as a channel so the store pipeline can copy
//!   from it instead of opening the file a second time.
//!
//! Notes:
//! - Advisory only: cooperating processes must also lock.
//! - The lock is released when the ExclusiveReadLock guard is dropped.

use fs2::FileExt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::trace;

/// RAII guard held while the exclusive read lock is active.
#[derive(Debug)]
pub struct ExclusiveReadLock {
    file: File,
    path: PathBuf,
}

impl ExclusiveReadLock {
    /// Blocking acquire. Waits until no other holder remains.
    pub fn acquire(path: &Path) -> io::Result<Self> {
        let start = Instant::now();
        let file = File::open(path)?;
        file.lock_exclusive()?;
        let waited = start.elapsed();
        trace!(path = %path.display(), waited_ms = waited.as_millis() as u64, "read lock acquired");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Non-blocking attempt. Ok(None) when another holder has the lock.
    pub fn try_acquire(path: &Path) -> io::Result<Option<Self>> {
        let file = File::open(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => {
                trace!(path = %path.display(), "try-lock success");
                Ok(Some(Self {
                    file,
                    path: path.to_path_buf(),
                }))
            }
            Err(e) if is_contended(&e) => {
                trace!(path = %path.display(), "try-lock would block");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// The locked handle; readers must not assume its cursor position.
    pub fn channel(&self) -> &File {
        &self.file
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ExclusiveReadLock {
    fn drop(&mut self) {
        // Closing the handle releases the lock too; unlock explicitly so the
        // release does not wait on the fd being closed.
        let _ = FileExt::unlock(&self.file);
        trace!(path = %self.path.display(), "read lock released");
    }
}

fn is_contended(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
