//! Timestamp and permission finalization through the store pipeline.

use filetime::FileTime;
use std::fs;
use tempfile::tempdir;

use file_store::{
    ConflictPolicy, FileStore, LocalFile, Payload, PermissionOutcome, PermissionSet, StoreConfig,
    StoreHints, TimestampOutcome,
};

const MILLIS: i64 = 1_577_836_800_123; // 2020-01-01T00:00:00.123Z

#[test]
fn keeps_last_modified_after_stream_write() {
    let td = tempdir().unwrap();
    let cfg = StoreConfig::new(td.path(), ConflictPolicy::Override).keep_last_modified(true);
    let out = FileStore::new()
        .store(
            &cfg,
            "stamped.txt".as_ref(),
            Payload::text("x"),
            &StoreHints::last_modified(MILLIS),
        )
        .unwrap();
    let meta = out.metadata.unwrap();
    assert_eq!(meta.timestamp, TimestampOutcome::Applied);
    let mtime = FileTime::from_last_modification_time(
        &fs::metadata(td.path().join("stamped.txt")).unwrap(),
    );
    assert_eq!(mtime.unix_seconds(), MILLIS / 1000);
}

#[test]
fn keeps_last_modified_after_rename() {
    let td = tempdir().unwrap();
    let staging = td.path().join("work.tmp");
    fs::write(&staging, b"body").unwrap();
    let cfg = StoreConfig::new(td.path(), ConflictPolicy::Override).keep_last_modified(true);
    let out = FileStore::new()
        .store(
            &cfg,
            "renamed.txt".as_ref(),
            LocalFile::staging(&staging).into(),
            &StoreHints::last_modified(MILLIS),
        )
        .unwrap();
    assert_eq!(out.metadata.unwrap().timestamp, TimestampOutcome::Applied);
    let mtime = FileTime::from_last_modification_time(
        &fs::metadata(td.path().join("renamed.txt")).unwrap(),
    );
    assert_eq!(mtime.unix_seconds(), MILLIS / 1000);
}

#[test]
fn timestamp_ignored_when_not_configured() {
    let td = tempdir().unwrap();
    let cfg = StoreConfig::new(td.path(), ConflictPolicy::Override);
    let out = FileStore::new()
        .store(&cfg, "t.txt".as_ref(), Payload::text("x"), &StoreHints::last_modified(0))
        .unwrap();
    assert_eq!(out.metadata.unwrap().timestamp, TimestampOutcome::Skipped);
}

#[cfg(unix)]
#[test]
fn chmod_applied_to_written_file() {
    use std::os::unix::fs::PermissionsExt;

    let td = tempdir().unwrap();
    let cfg = StoreConfig::new(td.path(), ConflictPolicy::Override)
        .with_chmod(PermissionSet::parse("640").unwrap());
    let out = FileStore::new()
        .store(&cfg, "secret.txt".as_ref(), Payload::text("x"), &StoreHints::default())
        .unwrap();
    assert_eq!(out.metadata.unwrap().permissions, PermissionOutcome::Applied(0o640));
    let mode = fs::metadata(td.path().join("secret.txt")).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o640);
}

#[test]
fn empty_permission_set_is_skipped() {
    let td = tempdir().unwrap();
    let cfg = StoreConfig::new(td.path(), ConflictPolicy::Override)
        .with_chmod(PermissionSet::parse("---------").unwrap());
    let out = FileStore::new()
        .store(&cfg, "t.txt".as_ref(), Payload::text("x"), &StoreHints::default())
        .unwrap();
    assert_eq!(out.metadata.unwrap().permissions, PermissionOutcome::Skipped);
}
