//! Resume filter for directory consumers.
//!
//! A restarted consumer seeds the filter with the entries it already handled,
//! resumes once over the candidates held over from the previous cycle, and then
//! filters every newly discovered batch. Entries are marked processed only
//! after the caller confirms the store succeeded.
//!
//! Every candidate handed out is claimed: its key joins an in-flight set in
//! the same write-locked step that checks it against the record. Until the
//! caller marks it processed (store succeeded) or releases it (store failed),
//! no other `filter` or `resume` yields that key again, so two discoverers
//! racing on one entry deliver it at most once.
//!
//! `filter` and `mark_processed` work in both states. `resume` only gates the
//! one-time pass over the held-over batch.

mod ledger;

pub use ledger::{FileResumeStore, ResumeStore, TransientResumeStore};

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, trace};

use crate::errors::ResumeError;

/// Identity of a directory entry: its relative path, normalized to forward
/// slashes with `.` segments removed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryKey(String);

impl EntryKey {
    pub fn new(relative: impl AsRef<Path>) -> Self {
        let mut key = String::new();
        for comp in relative.as_ref().components() {
            let part = match comp {
                Component::CurDir | Component::RootDir | Component::Prefix(_) => continue,
                Component::ParentDir => "..".into(),
                Component::Normal(s) => s.to_string_lossy(),
            };
            if !key.is_empty() {
                key.push('/');
            }
            key.push_str(&part);
        }
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntryKey {
    fn from(s: &str) -> Self {
        Self::new(s.replace('\\', "/"))
    }
}

/// A discovered entry: where it sits relative to the consumer root, and where
/// it is on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    key: EntryKey,
    relative: PathBuf,
    absolute: PathBuf,
}

impl Candidate {
    pub fn new(root: &Path, relative: impl Into<PathBuf>) -> Self {
        let relative = relative.into();
        Self {
            key: EntryKey::new(&relative),
            absolute: root.join(&relative),
            relative,
        }
    }

    /// Build from an absolute path under `root`; None when it is not under it.
    pub fn from_absolute(root: &Path, absolute: impl Into<PathBuf>) -> Option<Self> {
        let absolute = absolute.into();
        let relative = absolute.strip_prefix(root).ok()?.to_path_buf();
        Some(Self {
            key: EntryKey::new(&relative),
            relative,
            absolute,
        })
    }

    pub fn key(&self) -> &EntryKey {
        &self.key
    }

    pub fn relative(&self) -> &Path {
        &self.relative
    }

    pub fn absolute(&self) -> &Path {
        &self.absolute
    }

    pub fn file_name(&self) -> Option<&str> {
        self.relative.file_name().and_then(|n| n.to_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterState {
    /// Record loaded; resume not yet performed.
    Seeded,
    /// Resume done; filtering new batches.
    Active,
}

#[derive(Debug, Default)]
struct Record {
    processed: HashSet<EntryKey>,
    in_flight: HashSet<EntryKey>,
}

impl Record {
    fn is_open(&self, key: &EntryKey) -> bool {
        !self.processed.contains(key) && !self.in_flight.contains(key)
    }

    /// Check and claim in one step. False when processed or already claimed.
    fn claim(&mut self, key: &EntryKey) -> bool {
        !self.processed.contains(key) && self.in_flight.insert(key.clone())
    }
}

#[derive(Debug, Default)]
pub struct ResumeFilter {
    record: RwLock<Record>,
    active: AtomicBool,
}

impl ResumeFilter {
    /// A filter with an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with identities already handled by a previous run.
    pub fn seeded<I, K>(processed: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<EntryKey>,
    {
        let set: HashSet<EntryKey> = processed.into_iter().map(Into::into).collect();
        debug!(seeded = set.len(), "resume filter seeded");
        Self {
            record: RwLock::new(Record {
                processed: set,
                in_flight: HashSet::new(),
            }),
            active: AtomicBool::new(false),
        }
    }

    /// Seed from a persisted ledger.
    pub fn from_store(store: &dyn ResumeStore) -> Result<Self, ResumeError> {
        Ok(Self::seeded(store.load()?))
    }

    pub fn state(&self) -> FilterState {
        if self.active.load(Ordering::Acquire) {
            FilterState::Active
        } else {
            FilterState::Seeded
        }
    }

    /// Drop held-over candidates that were already processed; claims and
    /// returns the rest in input order. Allowed once.
    pub fn resume<I>(&self, held_over: I) -> Result<Vec<Candidate>, ResumeError>
    where
        I: IntoIterator<Item = Candidate>,
    {
        self.activate()?;
        let mut record = self.write();
        let resumed: Vec<Candidate> = held_over
            .into_iter()
            .filter(|c| record.claim(c.key()))
            .collect();
        info!(
            resumed = resumed.len(),
            processed = record.processed.len(),
            "resume performed"
        );
        Ok(resumed)
    }

    /// Like `resume`, but `excluded` decides which held-over candidates to
    /// drop instead of the record. Survivors are claimed.
    pub fn resume_with<I, F>(&self, held_over: I, excluded: F) -> Result<Vec<Candidate>, ResumeError>
    where
        I: IntoIterator<Item = Candidate>,
        F: Fn(&Candidate) -> bool,
    {
        self.activate()?;
        let mut record = self.write();
        let resumed: Vec<Candidate> = held_over
            .into_iter()
            .filter(|c| !excluded(c) && record.in_flight.insert(c.key().clone()))
            .collect();
        info!(resumed = resumed.len(), "resume performed with custom predicate");
        Ok(resumed)
    }

    /// Lazily yield and claim candidates that are neither processed nor
    /// claimed, preserving order.
    pub fn filter<'a, I>(&'a self, candidates: I) -> impl Iterator<Item = Candidate> + 'a
    where
        I: IntoIterator<Item = Candidate> + 'a,
        I::IntoIter: 'a,
    {
        candidates.into_iter().filter(move |c| {
            // Most entries in a rescanned directory are done; skip those under
            // the read lock and only take the write lock to claim.
            let open = self.read().is_open(c.key());
            let claimed = open && self.write().claim(c.key());
            if !claimed {
                trace!(entry = %c.key(), "skipping processed or claimed entry");
            }
            claimed
        })
    }

    pub fn is_processed(&self, key: &EntryKey) -> bool {
        self.read().processed.contains(key)
    }

    /// Whether `key` was handed out and is neither marked nor released.
    pub fn is_in_flight(&self, key: &EntryKey) -> bool {
        self.read().in_flight.contains(key)
    }

    /// Record a candidate as handled, dropping its claim. Returns false when
    /// it already was processed.
    pub fn mark_processed(&self, candidate: &Candidate) -> bool {
        let mut record = self.write();
        record.in_flight.remove(candidate.key());
        let inserted = record.processed.insert(candidate.key().clone());
        drop(record);
        if inserted {
            trace!(entry = %candidate.key(), "marked processed");
        }
        inserted
    }

    /// Drop the claim on a candidate whose store failed, so a later pass
    /// offers it again. Returns false when it was not claimed.
    pub fn release(&self, candidate: &Candidate) -> bool {
        let released = self.write().in_flight.remove(candidate.key());
        if released {
            debug!(entry = %candidate.key(), "claim released");
        }
        released
    }

    /// Snapshot of the processed record, ordered for persistence. Claimed
    /// entries are not included.
    pub fn processed(&self) -> BTreeSet<EntryKey> {
        self.read().processed.iter().cloned().collect()
    }

    pub fn persist(&self, store: &dyn ResumeStore) -> Result<(), ResumeError> {
        store.save(&self.processed())
    }

    fn activate(&self) -> Result<(), ResumeError> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| ResumeError::AlreadyActive)
    }

    // Every update is a single set insert or remove; a panicked writer cannot
    // leave the record half-updated.
    fn read(&self) -> RwLockReadGuard<'_, Record> {
        self.record.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Record> {
        self.record.write().unwrap_or_else(|p| p.into_inner())
    }
}
