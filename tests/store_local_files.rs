//! Local-file payloads: staging rename, preserved copy, locked channel copy.

use std::fs;
use tempfile::tempdir;

use file_store::{
    ConflictPolicy, ExclusiveReadLock, FileStore, LocalFile, Payload, StoreConfig, StoreHints,
    Strategy,
};

fn cfg(root: &std::path::Path, policy: ConflictPolicy) -> StoreConfig {
    let mut c = StoreConfig::new(root, policy);
    c.force_writes = false;
    c
}

#[test]
fn staging_file_is_renamed_onto_target() {
    let src_dir = tempdir().unwrap();
    let dst_dir = tempdir().unwrap();
    let staging = src_dir.path().join("download.part");
    fs::write(&staging, b"downloaded").unwrap();
    let target = dst_dir.path().join("final.bin");
    fs::write(&target, b"stale").unwrap();

    let out = FileStore::new()
        .store(
            &cfg(dst_dir.path(), ConflictPolicy::Override),
            &target,
            LocalFile::staging(&staging).into(),
            &StoreHints::default(),
        )
        .unwrap();
    assert_eq!(out.strategy, Strategy::Renamed);
    assert!(!staging.exists(), "staging file is consumed");
    assert_eq!(fs::read(&target).unwrap(), b"downloaded");
}

#[test]
fn preserved_file_is_copied_and_kept() {
    let td = tempdir().unwrap();
    let source = td.path().join("source.txt");
    fs::write(&source, b"keep me").unwrap();
    let target = td.path().join("out").join("copy.txt");

    let out = FileStore::new()
        .store(
            &cfg(td.path(), ConflictPolicy::Override),
            &target,
            LocalFile::preserved(&source).into(),
            &StoreHints::default(),
        )
        .unwrap();
    assert_eq!(out.strategy, Strategy::FileCopy);
    assert_eq!(fs::read(&source).unwrap(), b"keep me");
    assert_eq!(fs::read(&target).unwrap(), b"keep me");
}

#[test]
fn locked_source_copied_through_its_channel() {
    let td = tempdir().unwrap();
    let source = td.path().join("locked.dat");
    let data: Vec<u8> = (0..200_000u32).map(|i| (i % 253) as u8).collect();
    fs::write(&source, &data).unwrap();
    let target = td.path().join("copy.dat");
    fs::write(&target, b"previous and longer than nothing").unwrap();

    let lock = ExclusiveReadLock::acquire(&source).unwrap();
    let out = FileStore::new()
        .store(
            &cfg(td.path(), ConflictPolicy::Override),
            &target,
            LocalFile::preserved(&source).with_lock(&lock).into(),
            &StoreHints::default(),
        )
        .unwrap();
    assert_eq!(out.strategy, Strategy::ChannelCopy);
    // Still held by us; the store borrowed the channel without closing it.
    assert!(ExclusiveReadLock::try_acquire(&source).unwrap().is_none());
    drop(lock);
    assert_eq!(fs::read(&target).unwrap(), data);
}

#[test]
fn append_mode_streams_local_file_content() {
    let td = tempdir().unwrap();
    let source = td.path().join("chunk.txt");
    fs::write(&source, b"second").unwrap();
    let target = td.path().join("all.txt");
    fs::write(&target, b"first,").unwrap();

    let out = FileStore::new()
        .store(
            &cfg(td.path(), ConflictPolicy::Append),
            &target,
            LocalFile::staging(&source).into(),
            &StoreHints::default(),
        )
        .unwrap();
    assert_eq!(out.strategy, Strategy::Stream);
    assert!(source.exists(), "append never renames the source away");
    assert_eq!(fs::read(&target).unwrap(), b"first,second");
}

#[test]
fn charset_reads_local_file_through_lock_channel() {
    let td = tempdir().unwrap();
    let source = td.path().join("utf8.txt");
    fs::write(&source, "Zürich").unwrap();
    let target = td.path().join("latin1.txt");

    let lock = ExclusiveReadLock::acquire(&source).unwrap();
    let out = FileStore::new()
        .store(
            &cfg(td.path(), ConflictPolicy::Override).with_charset("windows-1252"),
            &target,
            Payload::LocalFile(LocalFile::preserved(&source).with_lock(&lock)),
            &StoreHints::default(),
        )
        .unwrap();
    assert_eq!(out.strategy, Strategy::Charset);
    assert_eq!(fs::read(&target).unwrap(), b"Z\xFCrich");
}

#[test]
fn missing_local_file_is_write_error() {
    let td = tempdir().unwrap();
    let err = FileStore::new()
        .store(
            &cfg(td.path(), ConflictPolicy::Override),
            "t.txt".as_ref(),
            LocalFile::preserved(td.path().join("vanished")).into(),
            &StoreHints::default(),
        )
        .unwrap_err();
    assert!(matches!(err, file_store::StoreError::WriteIo { .. }));
}

#[test]
fn store_onto_itself_is_a_noop() {
    let td = tempdir().unwrap();
    let file = td.path().join("same.txt");
    fs::write(&file, b"unchanged").unwrap();
    FileStore::new()
        .store(
            &cfg(td.path(), ConflictPolicy::Override),
            &file,
            LocalFile::preserved(&file).into(),
            &StoreHints::default(),
        )
        .unwrap();
    assert_eq!(fs::read(&file).unwrap(), b"unchanged");
}

#[test]
fn rename_and_delete_helpers() {
    let td = tempdir().unwrap();
    let store = FileStore::new();
    let a = td.path().join("a");
    let b = td.path().join("b");
    fs::write(&a, b"x").unwrap();

    let mut c = cfg(td.path(), ConflictPolicy::Override);
    assert!(store.rename_file(&c, &a, &b).unwrap());
    assert!(store.exists_file(&b) && !store.exists_file(&a));

    c.copy_and_delete_on_rename_fail = false;
    assert!(!store.rename_file(&c, &a, &b).unwrap(), "missing source is refused");

    c.rename_using_copy = true;
    assert!(store.rename_file(&c, &b, &a).unwrap());
    assert_eq!(fs::read(&a).unwrap(), b"x");

    assert!(store.delete_file(&a).unwrap());
    assert!(!store.delete_file(&a).unwrap());
}
