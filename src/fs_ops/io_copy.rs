//! Byte-level copy executors.
//!
//! Features:
//! - Opens targets in append (positioned at end) or truncate+create mode.
//! - Fixed-size chunked copy from any reader; the chunk size is configured.
//! - Channel copy from an already-open (locked) source handle: in-kernel
//!   `copy_file_range` on Linux, rewound buffered copy elsewhere.
//! - Optional full fsync for strong durability guarantees.
//!
//! Snapshot semantics: a source is read once from start to EOF; bytes appended
//! concurrently after EOF was observed are not included.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Durability mode controlling post-write flush behavior.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DurabilityMode {
    /// Data reaches the OS page cache; no disk barrier.
    Data,
    /// Force data and metadata to stable storage (`sync_all`).
    Full,
}

impl DurabilityMode {
    pub fn from_force_writes(force: bool) -> Self {
        if force { DurabilityMode::Full } else { DurabilityMode::Data }
    }
}

/// Result of a copy operation.
#[derive(Debug, Clone, Copy)]
pub struct CopyResult {
    /// Total bytes written to the target (excluding any separator).
    pub bytes: u64,
    /// Size of the buffer used for copying.
    pub buf_size: usize,
    /// Durability mode applied.
    pub mode: DurabilityMode,
}

/// Open `target` for writing: appending when `append`, else truncating.
/// Creates the file in both modes.
pub(crate) fn open_target(target: &Path, append: bool) -> io::Result<File> {
    let mut opts = OpenOptions::new();
    opts.create(true);
    if append {
        opts.append(true);
    } else {
        opts.write(true).truncate(true);
    }
    opts.open(target)
}

/// Apply the durability mode to a finished target handle.
pub(crate) fn finish(out: &mut File, mode: DurabilityMode) -> io::Result<()> {
    out.flush()?;
    if mode == DurabilityMode::Full {
        out.sync_all()?;
    }
    Ok(())
}

/// Copy `reader` into `out` in `buf_size` chunks until EOF.
pub(crate) fn copy_chunked<R: Read + ?Sized, W: Write + ?Sized>(
    reader: &mut R,
    out: &mut W,
    buf_size: usize,
) -> io::Result<u64> {
    let mut buf = vec![0u8; buf_size.max(1)];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        out.write_all(&buf[..n])?;
        total += n as u64;
    }
}

/// Stream `reader` into `target`, then write `trailer` (if any).
pub(crate) fn write_stream<R: Read + ?Sized>(
    reader: &mut R,
    target: &Path,
    append: bool,
    trailer: Option<&[u8]>,
    buf_size: usize,
    mode: DurabilityMode,
) -> io::Result<CopyResult> {
    let mut out = open_target(target, append)?;
    let bytes = copy_chunked(reader, &mut out, buf_size)?;
    if let Some(t) = trailer {
        out.write_all(t)?;
    }
    finish(&mut out, mode)?;
    Ok(CopyResult { bytes, buf_size, mode })
}

/// Copy the whole content of an already-open source handle into `target`,
/// replacing it. The handle's cursor is not relied upon.
pub(crate) fn copy_from_channel(
    channel: &File,
    target: &Path,
    buf_size: usize,
    mode: DurabilityMode,
) -> io::Result<CopyResult> {
    let mut out = open_target(target, false)?;

    #[cfg(target_os = "linux")]
    {
        if let Some(bytes) = copy_file_range_all(channel, &out)? {
            finish(&mut out, mode)?;
            return Ok(CopyResult { bytes, buf_size, mode });
        }
    }

    let mut src = channel;
    src.seek(SeekFrom::Start(0))?;
    let bytes = copy_chunked(&mut src, &mut out, buf_size)?;
    finish(&mut out, mode)?;
    Ok(CopyResult { bytes, buf_size, mode })
}

/// In-kernel copy from offset 0 of `src` into `dst`.
/// Ok(None) when the kernel or filesystem refuses before any byte moved.
#[cfg(target_os = "linux")]
fn copy_file_range_all(src: &File, dst: &File) -> io::Result<Option<u64>> {
    use std::os::unix::io::AsRawFd;

    const CHUNK: usize = 16 * 1024 * 1024;
    let mut off_in: libc::loff_t = 0;
    let mut total: u64 = 0;
    loop {
        // SAFETY: both fds are open for the duration of the call; off_in is a
        // valid pointer and the output offset uses the file cursor.
        let rc = unsafe {
            libc::copy_file_range(
                src.as_raw_fd(),
                &mut off_in,
                dst.as_raw_fd(),
                std::ptr::null_mut(),
                CHUNK,
                0,
            )
        };
        if rc > 0 {
            total += rc as u64;
            continue;
        }
        if rc == 0 {
            return Ok(Some(total));
        }
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            continue;
        }
        let unsupported = matches!(
            err.raw_os_error(),
            Some(code) if code == libc::EXDEV
                || code == libc::ENOSYS
                || code == libc::EINVAL
                || code == libc::EPERM
                || code == libc::EOPNOTSUPP
        );
        if total == 0 && unsupported {
            return Ok(None);
        }
        return Err(err);
    }
}
