//! Filesystem operations: modularized.

mod atomic;
pub mod charset;
mod dir_builder;
mod helpers;
mod io_copy;
mod lock;
mod meta;
mod move_existing;
mod payload;
mod permissions;
pub mod policy;
mod store;
mod util;

pub use charset::{Charset, lookup_charset};
pub use dir_builder::DirectoryBuilder;
pub use io_copy::{CopyResult, DurabilityMode};
pub use lock::ExclusiveReadLock;
pub use meta::{MetadataOutcome, PermissionOutcome, TimestampOutcome, finalize};
pub use move_existing::{MoveExistingStrategy, RenameExisting};
pub use payload::{LocalFile, Payload};
pub use permissions::PermissionSet;
pub use policy::{Action, resolve};
pub use store::{FileStore, StoreHints, StoreOutcome, Strategy};
