use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

fn with_suffix(stem: &OsStr, ext: Option<&OsStr>, suffix: &str) -> OsString {
    let mut name = OsString::from(stem);
    name.push(suffix);
    if let Some(e) = ext {
        name.push(".");
        name.push(e);
    }
    name
}

/// Return `candidate` if free, else a sibling named "<stem>-<millis>-<pid>[-n].<ext?>".
/// Keeps non-UTF8 names intact.
pub(crate) fn unique_destination(candidate: &Path) -> PathBuf {
    if !candidate.exists() {
        return candidate.to_path_buf();
    }

    let epoch_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let pid = std::process::id();

    let stem = candidate
        .file_stem()
        .map(OsStr::to_os_string)
        .unwrap_or_else(|| OsString::from("file"));
    let ext = candidate.extension();

    let dest = candidate.with_file_name(with_suffix(&stem, ext, &format!("-{epoch_ms}-{pid}")));
    if !dest.exists() {
        return dest;
    }

    for n in 2u32..=5 {
        let alt = candidate.with_file_name(with_suffix(
            &stem,
            ext,
            &format!("-{epoch_ms}-{pid}-{n}"),
        ));
        if !alt.exists() {
            return alt;
        }
    }

    candidate.with_file_name(with_suffix(&stem, ext, &format!("-{epoch_ms}-{pid}-final")))
}
