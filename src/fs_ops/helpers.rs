//! I/O error adapters.
//!
//! Converts io::Error into the typed store errors (with the target path
//! attached) and derives short operator hints from raw OS codes for logs.
//!
//! Usage:
//!   File::create(p).map_err(write_err("create target", p))?;
//!   warn!(hint = io_hint(&e), "rename failed");

use std::io;
use std::path::Path;

use crate::errors::StoreError;

/// Short, platform-aware hint for a failed filesystem call.
pub(crate) fn io_hint(e: &io::Error) -> &'static str {
    if let Some(code) = e.raw_os_error() {
        #[cfg(unix)]
        {
            match code {
                libc::EACCES | libc::EPERM => {
                    return "permission denied; check ownership and write permissions";
                }
                libc::EXDEV => return "cross-filesystem; atomic rename not possible",
                libc::EBUSY => return "resource busy; ensure no other process is writing",
                libc::ENOENT => return "path not found; verify it exists",
                libc::EEXIST => return "already exists",
                libc::ENOSPC => return "insufficient space on device",
                libc::EROFS => return "read-only filesystem",
                libc::ENAMETOOLONG => return "filename or path too long",
                libc::EMFILE | libc::ENFILE => return "file descriptor limit reached",
                _ => {}
            }
        }
        #[cfg(windows)]
        {
            match code {
                5 => return "access denied; check permissions",
                17 => return "not same device; cross-filesystem move",
                32 => return "sharing violation; file is in use",
                2 | 3 => return "path not found; verify it exists",
                80 | 183 => return "already exists",
                112 => return "insufficient disk space",
                _ => {}
            }
        }
    }
    match e.kind() {
        io::ErrorKind::PermissionDenied => "permission denied",
        io::ErrorKind::NotFound => "path not found",
        io::ErrorKind::AlreadyExists => "already exists",
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => "busy or timed out",
        _ => "unexpected I/O failure",
    }
}

/// Adapter for `.map_err(...)`: wraps io::Error into `StoreError::WriteIo`.
pub(crate) fn write_err<'a>(
    op: &'static str,
    path: &'a Path,
) -> impl FnOnce(io::Error) -> StoreError + 'a {
    move |source: io::Error| StoreError::WriteIo {
        op,
        path: path.to_path_buf(),
        source,
    }
}

/// Adapter for directory creation failures.
pub(crate) fn dir_err(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |source: io::Error| StoreError::DirectoryCreation {
        path: path.to_path_buf(),
        source,
    }
}
