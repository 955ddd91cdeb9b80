mod common;

use common::{StepClock, doc_bytes, doc_with_marker, marker_of, school_schema};
use safekeep::{
    DirMedium, Document, ErrorKind, LockMode, Medium, RingError, Upload, Vault,
};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn open(dir: &Path) -> Vault {
    Vault::builder(dir)
        .clock(StepClock::new())
        .schema(school_schema())
        .open()
        .unwrap()
}

fn import(vault: &mut Vault, marker: u64) {
    vault
        .request_import(&Upload::new("in.json", doc_bytes(&doc_with_marker(marker))))
        .unwrap();
}

/// Crash during a document write leaves a `.tmp` beside the real file.
/// The `.tmp` is ignored and the last committed document is current.
#[test]
fn test_crash_during_document_write() {
    let dir = tempdir().unwrap();
    {
        let mut vault = open(dir.path());
        import(&mut vault, 1);
    }

    fs::write(
        dir.path().join("current-document.json.tmp"),
        r#"{"profile": {"marker": 999"#,
    )
    .unwrap();

    let vault = open(dir.path());
    assert_eq!(marker_of(&vault.read_current()), Some(1));
}

/// Crash during a ring write leaves a `.tmp`; the committed ring survives.
#[test]
fn test_crash_during_ring_write() {
    let dir = tempdir().unwrap();
    let before;
    {
        let mut vault = open(dir.path());
        for marker in 1..=3 {
            import(&mut vault, marker);
        }
        before = vault.list_snapshots();
    }

    fs::write(dir.path().join("snapshot-ring.json.tmp"), "{\"snapshots\": [").unwrap();

    let vault = open(dir.path());
    assert_eq!(vault.list_snapshots(), before);
}

/// Crash after the archival snapshot was committed but before the document
/// was replaced: the snapshot exists and the old document is still current.
#[test]
fn test_crash_between_snapshot_and_replace() {
    let dir = tempdir().unwrap();
    let committed;
    {
        let mut vault = open(dir.path());
        import(&mut vault, 1);
        committed = fs::read(dir.path().join("current-document.json")).unwrap();
        import(&mut vault, 2);
    }

    // Roll the document back to its pre-import bytes, as if the process died
    // right after the ring write.
    fs::write(dir.path().join("current-document.json"), &committed).unwrap();

    let mut vault = open(dir.path());
    assert_eq!(marker_of(&vault.read_current()), Some(1));
    let list = vault.list_snapshots();
    assert_eq!(list.len(), 1);

    // Retrying the import works and archives document 1 again.
    import(&mut vault, 2);
    assert_eq!(vault.list_snapshots().len(), 2);
    assert_eq!(marker_of(&vault.read_current()), Some(2));
}

/// A truncated document reads as empty, but its bytes are still archived
/// by the next import rather than silently discarded.
#[test]
fn test_truncated_document_is_archived_not_lost() {
    let dir = tempdir().unwrap();
    {
        let mut vault = open(dir.path());
        import(&mut vault, 1);
    }
    let path = dir.path().join("current-document.json");
    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

    let mut vault = open(dir.path());
    assert_eq!(vault.read_current(), Document::new());

    import(&mut vault, 2);

    let snap = vault.ring().latest().unwrap();
    assert_eq!(snap.payload.as_bytes(), &bytes[..bytes.len() / 2]);
    let id = snap.id.clone();
    let err = vault.request_restore(&id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Persistence);
    assert!(matches!(
        vault.ring().restore_payload(&id),
        Err(RingError::CorruptPayload { .. })
    ));
    assert_eq!(marker_of(&vault.read_current()), Some(2));
}

/// Recovery from the same damaged state is deterministic.
#[test]
fn test_recovery_idempotent() {
    let dir = tempdir().unwrap();
    {
        let mut vault = open(dir.path());
        for marker in 1..=6 {
            import(&mut vault, marker);
        }
    }
    let ring_path = dir.path().join("snapshot-ring.json");
    let good_ring = fs::read(&ring_path).unwrap();

    let mut results = Vec::new();
    for _ in 0..3 {
        fs::write(&ring_path, &good_ring).unwrap();
        fs::write(dir.path().join("snapshot-ring.json.tmp"), b"garbage").unwrap();
        let vault = open(dir.path());
        results.push(vault.list_snapshots());
    }

    assert!(results.iter().all(|r| r == &results[0]));
    assert_eq!(results[0].len(), 5);
}

#[test]
fn test_dir_medium_write_leaves_no_tmp() {
    let dir = tempdir().unwrap();
    let medium = DirMedium::open_with_lock(dir.path(), LockMode::None).unwrap();

    medium.write("slot", b"{}").unwrap();

    assert!(dir.path().join("slot.json").exists());
    assert!(!dir.path().join("slot.json.tmp").exists());
    assert_eq!(medium.read("slot").unwrap().unwrap(), b"{}");
    assert!(medium.read("missing").unwrap().is_none());
}

#[test]
fn test_dir_medium_failed_write_keeps_old_value() {
    let dir = tempdir().unwrap();
    let medium = DirMedium::open_with_lock(dir.path(), LockMode::None).unwrap();
    medium.write("slot", b"old").unwrap();

    // A directory squatting on the temp path makes the write fail.
    fs::create_dir(dir.path().join("slot.json.tmp")).unwrap();
    assert!(medium.write("slot", b"new").is_err());

    assert_eq!(medium.read("slot").unwrap().unwrap(), b"old");
}

/// A torn ring file is set aside rather than overwritten by the next import.
#[test]
fn test_torn_ring_file_survives_next_import() {
    let dir = tempdir().unwrap();
    {
        let mut vault = open(dir.path());
        for marker in 1..=4 {
            import(&mut vault, marker);
        }
    }
    let ring_path = dir.path().join("snapshot-ring.json");
    let bytes = fs::read(&ring_path).unwrap();
    let torn = &bytes[..bytes.len() - 3];
    fs::write(&ring_path, torn).unwrap();

    let mut vault = open(dir.path());
    import(&mut vault, 5);

    assert_eq!(vault.list_snapshots().len(), 1);
    let kept = fs::read(dir.path().join("snapshot-ring-corrupt.json")).unwrap();
    assert_eq!(kept, torn);
}
