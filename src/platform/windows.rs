//! Windows implementations of platform helpers (best-effort, minimal ACL awareness).
//!
//! Notes:
//! - Windows lacks POSIX mode semantics; only the owner-write bit is mapped,
//!   onto the READONLY attribute.
//! - Directory fsync is not supported via std and is a no-op.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use super::temp::tmp_sibling_name;

/// Open log file for appending (no symlink defense available via std on Windows).
pub fn open_log_file_secure_append(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Map the owner-write bit onto the READONLY attribute.
pub fn apply_mode(path: &Path, mode: u32) -> io::Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_readonly(mode & 0o200 == 0);
    fs::set_permissions(path, perms)
}

pub fn fsync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

/// ERROR_NOT_SAME_DEVICE
pub fn is_cross_device(e: &io::Error) -> bool {
    e.raw_os_error() == Some(17)
}

/// Write to a unique sibling temp file, fsync, then replace `path`.
/// Rename does not overwrite on Windows, so the old file is removed first.
pub fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    let tmp = tmp_sibling_name(path);
    let mut f = OpenOptions::new().write(true).create_new(true).open(&tmp)?;
    if let Err(e) = f.write_all(contents).and_then(|_| f.sync_all()) {
        drop(f);
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    drop(f);
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            if e.kind() != io::ErrorKind::NotFound {
                let _ = fs::remove_file(&tmp);
                return Err(e);
            }
        }
    }
    fs::rename(&tmp, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp);
    })
}
