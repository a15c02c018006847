//! Payload representations accepted by the store pipeline.
//!
//! The caller hands over whatever form the body already has; the selector
//! matches on the variant instead of probing types at runtime.
//! Owned streams are dropped by the executor on every exit path. Borrowed
//! handles (a lock's channel) stay open and remain the caller's to close.

use encoding_rs::Encoding;
use std::borrow::Cow;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use super::lock::ExclusiveReadLock;

/// A body that already lives on the local filesystem.
#[derive(Debug)]
pub struct LocalFile<'a> {
    path: PathBuf,
    staging: bool,
    channel: Option<&'a File>,
}

impl<'a> LocalFile<'a> {
    /// A file the caller wants kept; it is copied, never moved.
    pub fn preserved(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            staging: false,
            channel: None,
        }
    }

    /// A disposable local work copy (e.g. a remote download staged to disk);
    /// it may be renamed onto the target.
    pub fn staging(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            staging: true,
            channel: None,
        }
    }

    /// Reuse the channel an exclusive read lock already holds on this file.
    pub fn with_lock(mut self, lock: &'a ExclusiveReadLock) -> Self {
        self.channel = Some(lock.channel());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_staging(&self) -> bool {
        self.staging
    }

    pub(crate) fn channel(&self) -> Option<&'a File> {
        self.channel
    }
}

/// The body of one store request.
pub enum Payload<'a> {
    /// Already materialized on disk.
    LocalFile(LocalFile<'a>),
    /// Raw bytes.
    ByteStream(Box<dyn Read + Send + 'a>),
    /// Character data delivered as a stream, encoded as `encoding`.
    CharStream {
        reader: Box<dyn Read + Send + 'a>,
        encoding: &'static Encoding,
    },
    /// Character data already in memory.
    Text(Cow<'a, str>),
    /// No body at all.
    Empty,
}

impl<'a> Payload<'a> {
    pub fn bytes<R: Read + Send + 'a>(reader: R) -> Self {
        Payload::ByteStream(Box::new(reader))
    }

    pub fn chars<R: Read + Send + 'a>(reader: R, encoding: &'static Encoding) -> Self {
        Payload::CharStream {
            reader: Box::new(reader),
            encoding,
        }
    }

    pub fn text(s: impl Into<Cow<'a, str>>) -> Self {
        Payload::Text(s.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Payload::LocalFile(f) if f.is_staging() => "staging-file",
            Payload::LocalFile(_) => "local-file",
            Payload::ByteStream(_) => "byte-stream",
            Payload::CharStream { .. } => "char-stream",
            Payload::Text(_) => "text",
            Payload::Empty => "empty",
        }
    }
}

impl fmt::Debug for Payload<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::LocalFile(l) => f.debug_tuple("LocalFile").field(l).finish(),
            Payload::Text(t) => f.debug_tuple("Text").field(&t.len()).finish(),
            Payload::CharStream { encoding, .. } => {
                f.debug_tuple("CharStream").field(&encoding.name()).finish()
            }
            other => f.write_str(other.kind()),
        }
    }
}

impl<'a> From<LocalFile<'a>> for Payload<'a> {
    fn from(f: LocalFile<'a>) -> Self {
        Payload::LocalFile(f)
    }
}

impl<'a> From<&'a str> for Payload<'a> {
    fn from(s: &'a str) -> Self {
        Payload::Text(Cow::Borrowed(s))
    }
}

impl From<String> for Payload<'_> {
    fn from(s: String) -> Self {
        Payload::Text(Cow::Owned(s))
    }
}
