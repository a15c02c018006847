//! The store pipeline: directory → policy → strategy → metadata.
//!
//! Strategy selection (first applicable wins):
//! 1. staging local file, no charset, not appending  → rename onto target
//! 2. preserved local file, no charset, not appending → file copy (lock channel if held)
//! 3. charset configured                              → decode UTF-8, re-encode
//! 4. in-memory text                                  → direct write
//! 5. anything else                                   → chunked byte stream
//!
//! Every I/O failure is reported as `StoreError::WriteIo` with the target path.

use encoding_rs::{Encoding, UTF_8};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{MAIN_SEPARATOR, Path, PathBuf};
use tracing::{debug, info, trace};

use super::atomic::{copy_then_delete, rename_or_copy, try_atomic_move};
use super::charset::{Charset, lookup_charset, write_encoded};
use super::dir_builder::DirectoryBuilder;
use super::helpers::{io_hint, write_err};
use super::io_copy::{DurabilityMode, copy_from_channel, finish, open_target, write_stream};
use super::meta::{self, MetadataOutcome};
use super::move_existing::{MoveExistingStrategy, RenameExisting};
use super::payload::{LocalFile, Payload};
use super::policy::{self, Action};
use crate::config::{ConflictPolicy, StoreConfig};
use crate::errors::{StoreError, StoreResult};

/// Which executor handled a store request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Existing target left untouched (Ignore policy).
    Skipped,
    EmptyBody,
    Renamed,
    ChannelCopy,
    FileCopy,
    Charset,
    Text,
    Stream,
}

/// Per-request metadata supplied by the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreHints {
    /// Last-modified time to apply, as epoch milliseconds.
    pub last_modified: Option<i64>,
}

impl StoreHints {
    pub fn last_modified(millis: i64) -> Self {
        Self {
            last_modified: Some(millis),
        }
    }
}

#[derive(Debug)]
pub struct StoreOutcome {
    pub strategy: Strategy,
    /// None when nothing was written.
    pub metadata: Option<MetadataOutcome>,
    /// Where the previous target went under the Move policy.
    pub moved_existing: Option<PathBuf>,
}

impl StoreOutcome {
    pub fn is_skipped(&self) -> bool {
        self.strategy == Strategy::Skipped
    }
}

/// Writes payloads to local files. Holds only the directory-creation lock and
/// the move-existing collaborator; all settings come in with each call.
#[derive(Debug)]
pub struct FileStore {
    dirs: DirectoryBuilder,
    move_existing: Box<dyn MoveExistingStrategy>,
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FileStore {
    pub fn new() -> Self {
        Self {
            dirs: DirectoryBuilder::new(),
            move_existing: Box::new(RenameExisting::new()),
        }
    }

    pub fn with_move_existing_strategy(mut self, strategy: impl MoveExistingStrategy + 'static) -> Self {
        self.move_existing = Box::new(strategy);
        self
    }

    pub fn directories(&self) -> &DirectoryBuilder {
        &self.dirs
    }

    /// Ensure an endpoint directory exists. `directory` is absolute, the root
    /// itself, a path under the root, a path used as given, or a bare child name.
    pub fn build_directory(
        &self,
        config: &StoreConfig,
        directory: &str,
        absolute: bool,
    ) -> StoreResult<bool> {
        if config.auto_create && !config.root.exists() {
            trace!(root = %config.root.display(), "building endpoint root");
            self.dirs
                .ensure_directory(&config.root, config.dir_chmod, config.root.is_absolute())?;
        }
        if directory.is_empty() {
            return Ok(true);
        }
        let path = resolve_directory(&config.root, directory, absolute);
        self.dirs.ensure_directory(&path, config.dir_chmod, absolute)
    }

    /// Write `payload` to `target` (relative targets resolve under the root).
    pub fn store(
        &self,
        config: &StoreConfig,
        target: &Path,
        payload: Payload<'_>,
        hints: &StoreHints,
    ) -> StoreResult<StoreOutcome> {
        let target = if target.is_absolute() {
            target.to_path_buf()
        } else {
            config.root.join(target)
        };
        let charset = config.charset.as_deref().map(lookup_charset).transpose()?;

        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !self
                .dirs
                .ensure_directory(parent, config.dir_chmod, parent.is_absolute())?
            {
                return Err(StoreError::DirectoryCreation {
                    path: parent.to_path_buf(),
                    source: io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        "a path segment exists and is not a directory",
                    ),
                });
            }
        }

        let action = policy::resolve(target.exists(), config.policy);
        debug!(
            path = %target.display(),
            policy = %config.policy,
            ?action,
            payload = payload.kind(),
            "store requested"
        );

        let mut moved_existing = None;
        match action {
            Action::SkipAsSuccess => {
                trace!(path = %target.display(), "target exists; ignoring");
                return Ok(StoreOutcome {
                    strategy: Strategy::Skipped,
                    metadata: None,
                    moved_existing: None,
                });
            }
            Action::Fail => return Err(StoreError::Conflict(target)),
            Action::MoveThenProceed => {
                moved_existing = Some(self.move_existing.move_existing(config, &target)?);
            }
            Action::ProceedWrite | Action::AppendAtEnd | Action::OverrideTruncate => {}
        }

        let strategy = if let Payload::Empty = payload {
            if !config.allow_null_body {
                return Err(StoreError::NullPayload(target));
            }
            write_empty_body(config, &target)?;
            Strategy::EmptyBody
        } else {
            write_payload(config, &target, payload, charset, action.appends())?
        };

        let metadata = meta::finalize(config, &target, hints.last_modified)?;
        info!(path = %target.display(), ?strategy, "stored");
        Ok(StoreOutcome {
            strategy,
            metadata: Some(metadata),
            moved_existing,
        })
    }

    /// Remove `path`. Ok(false) when nothing was there.
    pub fn delete_file(&self, path: &Path) -> StoreResult<bool> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(write_err("delete file", path)(e)),
        }
    }

    /// Rename `from` to `to`. Ok(false) when the rename was refused and no
    /// copy fallback is configured.
    pub fn rename_file(&self, config: &StoreConfig, from: &Path, to: &Path) -> StoreResult<bool> {
        if config.rename_using_copy {
            copy_then_delete(from, to)?;
            return Ok(true);
        }
        if config.copy_and_delete_on_rename_fail {
            rename_or_copy(from, to, true)?;
            return Ok(true);
        }
        match try_atomic_move(from, to) {
            Ok(()) => Ok(true),
            Err(e) => {
                debug!(error = %e, hint = io_hint(&e), src = %from.display(), dest = %to.display(), "rename refused");
                Ok(false)
            }
        }
    }

    pub fn exists_file(&self, path: &Path) -> bool {
        path.exists()
    }
}

fn resolve_directory(root: &Path, directory: &str, absolute: bool) -> PathBuf {
    let target = Path::new(directory);
    if absolute {
        return target.to_path_buf();
    }
    if target == root {
        return root.to_path_buf();
    }
    if directory.contains('/') || directory.contains('\\') {
        let under_root = root.to_str().and_then(|r| {
            [MAIN_SEPARATOR, '/']
                .into_iter()
                .find_map(|sep| directory.strip_prefix(&format!("{r}{sep}")))
                .filter(|rest| !rest.is_empty())
        });
        return match under_root {
            Some(rest) => root.join(rest),
            None => target.to_path_buf(),
        };
    }
    root.join(directory)
}

/// Empty body: create when absent, truncate under Override, else leave as-is.
fn write_empty_body(config: &StoreConfig, target: &Path) -> StoreResult<()> {
    if !target.exists() {
        debug!(path = %target.display(), "creating empty file");
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(target)
            .map_err(write_err("create empty file", target))?;
    } else if config.policy == ConflictPolicy::Override {
        debug!(path = %target.display(), "truncating existing file");
        OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(target)
            .map_err(write_err("truncate file", target))?;
    }
    Ok(())
}

fn write_payload(
    config: &StoreConfig,
    target: &Path,
    payload: Payload<'_>,
    charset: Option<Charset>,
    append: bool,
) -> StoreResult<Strategy> {
    let mode = DurabilityMode::from_force_writes(config.force_writes);
    let buf_size = config.buffer_size.max(1);
    let separator = config.separator();

    let payload = match payload {
        Payload::LocalFile(file) if charset.is_none() && !append => {
            match write_local_file(config, target, &file, buf_size, mode)? {
                Some(strategy) => return Ok(strategy),
                None => Payload::LocalFile(file),
            }
        }
        other => other,
    };

    if let Some(charset) = charset {
        let (mut reader, source) = into_reader(payload).map_err(write_err("open payload", target))?;
        trace!(
            path = %target.display(),
            charset = charset.name(),
            source = source.name(),
            "writing with charset"
        );
        write_encoded(&mut reader, target, append, separator, source, charset, buf_size, mode)
            .map_err(write_err("write with charset", target))?;
        return Ok(Strategy::Charset);
    }

    if let Payload::Text(text) = &payload {
        trace!(path = %target.display(), len = text.len(), "writing text");
        write_text(text, target, append, separator, mode)
            .map_err(write_err("write text", target))?;
        return Ok(Strategy::Text);
    }

    // Without a target charset, character streams keep their own encoding.
    let (mut reader, _) = into_reader(payload).map_err(write_err("open payload", target))?;
    let res = write_stream(
        &mut reader,
        target,
        append,
        separator.map(str::as_bytes),
        buf_size,
        mode,
    )
    .map_err(write_err("write stream", target))?;
    debug!(path = %target.display(), bytes = res.bytes, buf_size = res.buf_size, append, "wrote stream");
    Ok(Strategy::Stream)
}

/// File-based strategies. Ok(None) when the source is missing and the
/// payload should fall through to the stream executors.
fn write_local_file(
    config: &StoreConfig,
    target: &Path,
    file: &LocalFile<'_>,
    buf_size: usize,
    mode: DurabilityMode,
) -> StoreResult<Option<Strategy>> {
    let source = file.path();
    if !source.exists() {
        return Ok(None);
    }

    if file.is_staging() {
        trace!(src = %source.display(), dest = %target.display(), "renaming staging file");
        rename_or_copy(source, target, config.copy_and_delete_on_rename_fail)?;
        return Ok(Some(Strategy::Renamed));
    }

    if is_same_file(source, target) {
        debug!(path = %target.display(), "source is the target; nothing to copy");
        return Ok(Some(Strategy::FileCopy));
    }

    if let Some(channel) = file.channel() {
        trace!(src = %source.display(), dest = %target.display(), "copying from locked channel");
        copy_from_channel(channel, target, buf_size, mode)
            .map_err(write_err("copy from locked channel", target))?;
        return Ok(Some(Strategy::ChannelCopy));
    }

    trace!(src = %source.display(), dest = %target.display(), "copying file");
    fs::copy(source, target).map_err(write_err("copy file", target))?;
    if mode == DurabilityMode::Full {
        OpenOptions::new()
            .write(true)
            .open(target)
            .and_then(|f| f.sync_all())
            .map_err(write_err("sync target", target))?;
    }
    Ok(Some(Strategy::FileCopy))
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn write_text(
    text: &str,
    target: &Path,
    append: bool,
    separator: Option<&str>,
    mode: DurabilityMode,
) -> io::Result<()> {
    let mut out = open_target(target, append)?;
    out.write_all(text.as_bytes())?;
    if let Some(sep) = separator {
        out.write_all(sep.as_bytes())?;
    }
    finish(&mut out, mode)
}

/// Turn a payload into a byte reader plus the encoding its bytes carry
/// (UTF-8 for everything but character streams). Local files are read from a
/// held lock channel (rewound) when present; Empty reads as zero bytes.
fn into_reader<'a>(
    payload: Payload<'a>,
) -> io::Result<(Box<dyn Read + Send + 'a>, &'static Encoding)> {
    let reader: Box<dyn Read + Send + 'a> = match payload {
        Payload::CharStream { reader, encoding } => return Ok((reader, encoding)),
        Payload::ByteStream(r) => r,
        Payload::Text(text) => Box::new(io::Cursor::new(text.into_owned().into_bytes())),
        Payload::LocalFile(file) => match file.channel() {
            Some(mut channel) => {
                channel.seek(SeekFrom::Start(0))?;
                Box::new(channel)
            }
            None => Box::new(File::open(file.path())?),
        },
        Payload::Empty => Box::new(io::empty()),
    };
    Ok((reader, UTF_8))
}
