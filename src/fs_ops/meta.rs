//! Metadata finalization after a successful write.
//! - Last-modified timestamp: best-effort; failures are logged and reported, never fatal.
//! - Permission bits: hard; a failed chmod fails the store.

use filetime::{FileTime, set_file_mtime};
use std::path::Path;
use tracing::{trace, warn};

use crate::config::StoreConfig;
use crate::errors::{StoreError, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampOutcome {
    Applied,
    /// Not requested, or no timestamp was supplied.
    Skipped,
    /// Attempted and failed; logged at warn.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionOutcome {
    Applied(u32),
    Skipped,
}

/// What the metadata step did to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataOutcome {
    pub timestamp: TimestampOutcome,
    pub permissions: PermissionOutcome,
}

/// Convert epoch milliseconds to a FileTime (negative values are pre-epoch).
fn filetime_from_millis(millis: i64) -> FileTime {
    let secs = millis.div_euclid(1000);
    let nanos = (millis.rem_euclid(1000) * 1_000_000) as u32;
    FileTime::from_unix_time(secs, nanos)
}

pub fn finalize(
    config: &StoreConfig,
    target: &Path,
    last_modified_millis: Option<i64>,
) -> StoreResult<MetadataOutcome> {
    let timestamp = match last_modified_millis.filter(|_| config.keep_last_modified) {
        Some(millis) => match set_file_mtime(target, filetime_from_millis(millis)) {
            Ok(()) => {
                trace!(path = %target.display(), millis, "set last-modified");
                TimestampOutcome::Applied
            }
            Err(e) => {
                warn!(path = %target.display(), millis, error = %e, "cannot set last-modified timestamp");
                TimestampOutcome::Failed
            }
        },
        None => TimestampOutcome::Skipped,
    };

    let permissions = match config.chmod.filter(|p| !p.is_empty()) {
        Some(perms) => {
            perms.apply(target).map_err(|source| StoreError::MetadataApply {
                path: target.to_path_buf(),
                mode: perms.mode(),
                source,
            })?;
            trace!(path = %target.display(), mode = %perms, "applied permissions");
            PermissionOutcome::Applied(perms.mode())
        }
        None => PermissionOutcome::Skipped,
    };

    Ok(MetadataOutcome {
        timestamp,
        permissions,
    })
}
