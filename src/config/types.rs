//! Core configuration types.
//! - StoreConfig holds the immutable per-endpoint write settings.
//! - ConflictPolicy selects behavior when a target already exists.
//! - LogLevel represents verbosity with simple parsing helpers.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::fs_ops::PermissionSet;

use super::DEFAULT_BUFFER_SIZE;

/// What to do when the write target already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Leave the existing file untouched and report success.
    Ignore,
    /// Refuse the write.
    Fail,
    /// Relocate the existing file first, then write.
    Move,
    /// Add the payload at the end of the existing file.
    Append,
    /// Truncate and replace.
    #[default]
    Override,
}

impl ConflictPolicy {
    /// Parse the literal policy name (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ignore" => Some(ConflictPolicy::Ignore),
            "fail" => Some(ConflictPolicy::Fail),
            "move" => Some(ConflictPolicy::Move),
            "append" => Some(ConflictPolicy::Append),
            "override" => Some(ConflictPolicy::Override),
            _ => None,
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConflictPolicy::Ignore => "Ignore",
            ConflictPolicy::Fail => "Fail",
            ConflictPolicy::Move => "Move",
            ConflictPolicy::Append => "Append",
            ConflictPolicy::Override => "Override",
        };
        f.write_str(s)
    }
}

impl FromStr for ConflictPolicy {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid conflict policy: '{s}'"))
    }
}

/// Program-defined verbosity levels exposed to users/config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Only errors
    Quiet,
    /// Informational output (default)
    #[default]
    Normal,
    /// More info (like verbose)
    Info,
    /// Debug/trace
    Debug,
}

impl LogLevel {
    /// Parse common string names into our LogLevel (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "quiet" | "error" | "none" => Some(LogLevel::Quiet),
            "normal" => Some(LogLevel::Normal),
            "info" | "verbose" | "detailed" => Some(LogLevel::Info),
            "debug" | "trace" => Some(LogLevel::Debug),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Quiet => "quiet",
            LogLevel::Normal => "normal",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        };
        f.write_str(s)
    }
}

impl FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid log level: '{s}'"))
    }
}

/// Per-endpoint write configuration. Passed by reference into every store
/// operation; never mutated while operations are running.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Endpoint root; relative directories are resolved under it
    pub root: PathBuf,
    /// Behavior when the target exists
    pub policy: ConflictPolicy,
    /// Chunk size for stream copies (bytes)
    pub buffer_size: usize,
    /// Write text through this charset instead of raw bytes
    pub charset: Option<String>,
    /// Written after the payload when appending
    pub append_separator: Option<String>,
    /// Accept an absent body and write an empty file
    pub allow_null_body: bool,
    /// Apply the caller-supplied last-modified timestamp
    pub keep_last_modified: bool,
    /// Mode applied to written files
    pub chmod: Option<PermissionSet>,
    /// Mode applied to each directory segment created
    pub dir_chmod: Option<PermissionSet>,
    /// Create the endpoint root when building directories
    pub auto_create: bool,
    /// When a rename fails, copy then delete the source instead
    pub copy_and_delete_on_rename_fail: bool,
    /// Always rename by copy + delete
    pub rename_using_copy: bool,
    /// fsync targets before reporting success
    pub force_writes: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            policy: ConflictPolicy::Override,
            buffer_size: DEFAULT_BUFFER_SIZE,
            charset: None,
            append_separator: None,
            allow_null_body: false,
            keep_last_modified: false,
            chmod: None,
            dir_chmod: None,
            auto_create: true,
            copy_and_delete_on_rename_fail: true,
            rename_using_copy: false,
            force_writes: true,
        }
    }
}

impl StoreConfig {
    /// Construct a config rooted at `root` with the given policy; other fields use defaults.
    pub fn new(root: impl Into<PathBuf>, policy: ConflictPolicy) -> Self {
        Self {
            root: root.into(),
            policy,
            ..Default::default()
        }
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    pub fn with_append_separator(mut self, sep: impl Into<String>) -> Self {
        self.append_separator = Some(sep.into());
        self
    }

    pub fn with_chmod(mut self, perms: PermissionSet) -> Self {
        self.chmod = Some(perms);
        self
    }

    pub fn with_dir_chmod(mut self, perms: PermissionSet) -> Self {
        self.dir_chmod = Some(perms);
        self
    }

    pub fn allow_null_body(mut self, allow: bool) -> Self {
        self.allow_null_body = allow;
        self
    }

    pub fn keep_last_modified(mut self, keep: bool) -> Self {
        self.keep_last_modified = keep;
        self
    }

    /// True when appending; the separator only applies in that mode.
    pub fn is_append(&self) -> bool {
        self.policy == ConflictPolicy::Append
    }

    /// Separator to write after the payload, if any applies.
    pub(crate) fn separator(&self) -> Option<&str> {
        if self.is_append() {
            self.append_separator.as_deref()
        } else {
            None
        }
    }
}
