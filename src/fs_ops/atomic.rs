//! Rename helpers.
//! - `try_atomic_move` performs a plain rename with typed errors.
//! - On Windows, removes an existing destination first (MoveFile doesn't overwrite).
//! - On Unix, best-effort fsync of the destination directory after rename.
//! - `rename_or_copy` adds the copy-then-delete fallback for cross-device moves.

use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

use super::helpers::{io_hint, write_err};
use crate::errors::StoreResult;
use crate::platform;

pub(crate) fn try_atomic_move(src: &Path, dst: &Path) -> io::Result<()> {
    #[cfg(windows)]
    {
        if dst.exists() {
            if let Err(e) = fs::remove_file(dst) {
                if e.kind() != io::ErrorKind::NotFound {
                    return Err(e);
                }
            }
        }
    }

    fs::rename(src, dst)?;

    // Ignore fsync errors to avoid turning a successful rename into a failure.
    if let Some(parent) = dst.parent().filter(|p| !p.as_os_str().is_empty()) {
        let _ = platform::fsync_dir(parent);
    }
    Ok(())
}

/// Copy `src` over `dst`, then remove `src`.
pub(crate) fn copy_then_delete(src: &Path, dst: &Path) -> StoreResult<()> {
    fs::copy(src, dst).map_err(write_err("copy source to target", dst))?;
    fs::remove_file(src).map_err(write_err("remove source after copy", src))?;
    Ok(())
}

/// Rename `src` onto `dst`; when the rename is refused and `copy_fallback` is
/// set, copy then delete the source instead.
pub(crate) fn rename_or_copy(src: &Path, dst: &Path, copy_fallback: bool) -> StoreResult<()> {
    match try_atomic_move(src, dst) {
        Ok(()) => {
            debug!(src = %src.display(), dest = %dst.display(), "renamed atomically");
            Ok(())
        }
        Err(e) if copy_fallback => {
            let hint = if platform::is_cross_device(&e) {
                "cross-filesystem; will copy instead"
            } else {
                io_hint(&e)
            };
            warn!(error = %e, hint, src = %src.display(), dest = %dst.display(), "rename failed, using copy+delete");
            copy_then_delete(src, dst)
        }
        Err(e) => Err(write_err("rename onto target", dst)(e)),
    }
}
