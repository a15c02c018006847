//! Resume filter: seeded exclusion, marking, persistence across restarts.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::tempdir;
use walkdir::WalkDir;

use file_store::{
    Candidate, ConflictPolicy, EntryKey, FileResumeStore, FileStore, FilterState, Payload,
    ResumeError, ResumeFilter, ResumeStore, StoreConfig, StoreHints, TransientResumeStore,
};

fn numbered(root: &Path) -> Vec<Candidate> {
    (0..=6).map(|i| Candidate::new(root, format!("{i}.txt"))).collect()
}

fn keys(c: &[Candidate]) -> Vec<String> {
    c.iter().map(|c| c.key().to_string()).collect()
}

#[test]
fn seeded_entries_are_excluded_then_marked_entries_too() {
    let root = Path::new("/var/inbox");
    let filter = ResumeFilter::seeded(["0.txt", "1.txt", "2.txt"]);

    let first: Vec<Candidate> = filter.filter(numbered(root)).collect();
    assert_eq!(keys(&first), ["3.txt", "4.txt", "5.txt", "6.txt"]);

    for c in &first {
        filter.mark_processed(c);
    }
    assert_eq!(filter.filter(numbered(root)).count(), 0);
}

#[test]
fn resume_then_filter_new_batches() {
    let root = Path::new("/var/inbox");
    let store = TransientResumeStore::with_entries(["0.txt", "1.txt", "2.txt"]);
    let filter = ResumeFilter::from_store(&store).unwrap();

    let resumed = filter.resume(numbered(root)).unwrap();
    assert_eq!(resumed.len(), 4);
    assert_eq!(filter.state(), FilterState::Active);
    assert!(matches!(filter.resume(Vec::new()), Err(ResumeError::AlreadyActive)));
}

#[test]
fn filter_is_lazy() {
    let root = Path::new("/in");
    let filter = ResumeFilter::new();
    let mut it = filter.filter(numbered(root));
    let first = it.next().unwrap();
    // Marking after the iterator was created still excludes later candidates.
    filter.mark_processed(&Candidate::new(root, "1.txt"));
    let rest: Vec<_> = it.collect();
    assert_eq!(first.key().as_str(), "0.txt");
    assert_eq!(keys(&rest), ["2.txt", "3.txt", "4.txt", "5.txt", "6.txt"]);
}

#[test]
fn filter_never_yields_an_entry_marked_before_the_check() {
    let root = Path::new("/in");
    let filter = Arc::new(ResumeFilter::new());
    let all: Vec<Candidate> = (0..500).map(|i| Candidate::new(root, format!("{i}.dat"))).collect();
    // Count of leading entries whose mark has completed.
    let marked = Arc::new(AtomicUsize::new(0));

    let marker = {
        let filter = Arc::clone(&filter);
        let marked = Arc::clone(&marked);
        let all = all.clone();
        thread::spawn(move || {
            for (i, c) in all.iter().enumerate() {
                filter.mark_processed(c);
                marked.store(i + 1, Ordering::SeqCst);
            }
        })
    };

    let mut yielded = Vec::new();
    let mut it = filter.filter(all.clone());
    loop {
        let completed = marked.load(Ordering::SeqCst);
        let Some(c) = it.next() else { break };
        let index: usize = c.key().as_str().trim_end_matches(".dat").parse().unwrap();
        assert!(index >= completed, "{} yielded after its mark completed", c.key());
        yielded.push(c);
    }
    drop(it);
    marker.join().unwrap();

    // Stores of the yielded entries succeed.
    for c in &yielded {
        filter.mark_processed(c);
        assert!(!filter.is_in_flight(c.key()));
    }
    assert_eq!(filter.processed().len(), 500);
    assert_eq!(filter.filter(all).count(), 0);
}

#[test]
fn racing_filters_deliver_an_entry_at_most_once() {
    let root = Path::new("/in");
    for round in 0..200 {
        let filter = Arc::new(ResumeFilter::new());
        let entry = Candidate::new(root, format!("race-{round}.txt"));
        let barrier = Arc::new(Barrier::new(2));

        let workers: Vec<_> = (0..2)
            .map(|_| {
                let filter = Arc::clone(&filter);
                let barrier = Arc::clone(&barrier);
                let entry = entry.clone();
                thread::spawn(move || {
                    barrier.wait();
                    filter.filter(vec![entry]).count()
                })
            })
            .collect();
        let total: usize = workers.into_iter().map(|w| w.join().unwrap()).sum();
        assert_eq!(total, 1, "round {round}");
        assert!(filter.is_in_flight(entry.key()));
    }
}

#[test]
fn released_entry_is_offered_again_after_failed_store() {
    let inbox = tempdir().unwrap();
    let outbox = tempdir().unwrap();
    fs::write(inbox.path().join("a.txt"), "a").unwrap();
    fs::write(outbox.path().join("a.txt"), "taken").unwrap();

    let filter = ResumeFilter::new();
    let store = FileStore::new();
    let mut cfg = StoreConfig::new(outbox.path(), ConflictPolicy::Fail);
    cfg.force_writes = false;
    let batch = || vec![Candidate::new(inbox.path(), "a.txt")];

    let c = filter.filter(batch()).next().unwrap();
    let file = fs::File::open(c.absolute()).unwrap();
    assert!(store.store(&cfg, c.relative(), Payload::bytes(file), &StoreHints::default()).is_err());
    assert_eq!(filter.filter(batch()).count(), 0, "claimed entry must not be re-offered");
    assert!(filter.release(&c));

    fs::remove_file(outbox.path().join("a.txt")).unwrap();
    let c = filter.filter(batch()).next().unwrap();
    let file = fs::File::open(c.absolute()).unwrap();
    store
        .store(&cfg, c.relative(), Payload::bytes(file), &StoreHints::default())
        .unwrap();
    assert!(filter.mark_processed(&c));
    assert_eq!(filter.filter(batch()).count(), 0);
}

#[test]
fn ledger_survives_restart() {
    let td = tempdir().unwrap();
    let ledger = FileResumeStore::new(td.path().join("state").join("processed.ledger"));
    let root = Path::new("/in");

    {
        let filter = ResumeFilter::from_store(&ledger).unwrap();
        filter.resume(Vec::new()).unwrap();
        for c in filter.filter(numbered(root)).take(3).collect::<Vec<_>>() {
            filter.mark_processed(&c);
        }
        filter.persist(&ledger).unwrap();
    }

    let restarted = ResumeFilter::from_store(&ledger).unwrap();
    let remaining = restarted.resume(numbered(root)).unwrap();
    assert_eq!(keys(&remaining), ["3.txt", "4.txt", "5.txt", "6.txt"]);
    assert_eq!(
        ledger.load().unwrap(),
        vec![EntryKey::from("0.txt"), EntryKey::from("1.txt"), EntryKey::from("2.txt")]
    );
}

#[test]
fn consume_directory_and_mark_after_store() {
    let inbox = tempdir().unwrap();
    let outbox = tempdir().unwrap();
    fs::create_dir_all(inbox.path().join("sub")).unwrap();
    for name in ["a.txt", "b.txt", "sub/c.txt"] {
        fs::write(inbox.path().join(name), name).unwrap();
    }

    let discover = || -> Vec<Candidate> {
        let mut found: Vec<_> = WalkDir::new(inbox.path())
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| Candidate::from_absolute(inbox.path(), e.path()))
            .collect();
        found.sort_by(|a, b| a.key().cmp(b.key()));
        found
    };

    let filter = ResumeFilter::seeded(["a.txt"]);
    filter.resume(Vec::new()).unwrap();
    let store = FileStore::new();
    let mut cfg = StoreConfig::new(outbox.path(), ConflictPolicy::Fail);
    cfg.force_writes = false;

    for c in filter.filter(discover()).collect::<Vec<_>>() {
        let file = fs::File::open(c.absolute()).unwrap();
        store
            .store(&cfg, c.relative(), Payload::bytes(file), &StoreHints::default())
            .unwrap();
        filter.mark_processed(&c);
    }

    assert!(!outbox.path().join("a.txt").exists());
    assert_eq!(fs::read_to_string(outbox.path().join("sub/c.txt")).unwrap(), "sub/c.txt");
    assert_eq!(filter.filter(discover()).count(), 0);
}
