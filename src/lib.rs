//! Core library for `file_store`.
//!
//! Persists incoming payloads to local files under a per-endpoint conflict
//! policy, picking the cheapest correct write strategy (rename, channel copy,
//! file copy, charset transcoding, text or byte stream), and filters directory
//! entries a restarted consumer has already handled.
//!
//! ```no_run
//! use file_store::{ConflictPolicy, FileStore, Payload, StoreConfig, StoreHints};
//! use std::path::Path;
//!
//! let cfg = StoreConfig::new("/srv/inbox", ConflictPolicy::Append).with_append_separator("\n");
//! let store = FileStore::new();
//! store.store(&cfg, Path::new("events.log"), Payload::text("hello"), &StoreHints::default())?;
//! # Ok::<(), file_store::StoreError>(())
//! ```

pub mod config;
pub mod errors;
pub mod fs_ops;
pub mod logging;
pub mod platform;
pub mod resume;

pub use config::{
    ConflictPolicy, LoadedConfig, LogLevel, StoreConfig, default_config_path, default_log_path,
    load_config_from_env, load_config_from_xml_path, path_has_symlink_ancestor,
};
pub use errors::{ResumeError, StoreError, StoreResult};
pub use fs_ops::{
    Charset, DirectoryBuilder, ExclusiveReadLock, FileStore, LocalFile, MetadataOutcome,
    MoveExistingStrategy, Payload, PermissionOutcome, PermissionSet, RenameExisting, StoreHints,
    StoreOutcome, Strategy, TimestampOutcome,
};
pub use logging::init_tracing;
pub use resume::{
    Candidate, EntryKey, FileResumeStore, FilterState, ResumeFilter, ResumeStore,
    TransientResumeStore,
};
