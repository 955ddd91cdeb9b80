mod common;

use common::doc_with_marker;
use safekeep::{
    DOCUMENT_KEY, Document, DocumentStore, Medium, MemoryMedium, RING_KEY, StoreError,
};
use serde_json::json;
use std::sync::Arc;

fn store_on(medium: &Arc<MemoryMedium>) -> DocumentStore {
    DocumentStore::new(medium.clone())
}

#[test]
fn test_fresh_store_reads_empty_document() {
    let medium = Arc::new(MemoryMedium::new());
    let store = store_on(&medium);

    assert_eq!(store.read(), Document::new());
    assert!(!store.has_data().unwrap());
    assert_eq!(store.read_raw().unwrap(), None);
}

#[test]
fn test_replace_then_read() {
    let medium = Arc::new(MemoryMedium::new());
    let store = store_on(&medium);

    let doc = doc_with_marker(7);
    store.replace(&doc).unwrap();

    assert_eq!(store.read(), doc);
    assert!(store.has_data().unwrap());
}

#[test]
fn test_read_is_idempotent() {
    let medium = Arc::new(MemoryMedium::new());
    let store = store_on(&medium);
    store.replace(&doc_with_marker(1)).unwrap();

    assert_eq!(store.read(), store.read());
}

#[test]
fn test_corrupt_slot_reads_empty() {
    let medium = Arc::new(MemoryMedium::new());
    medium.write(DOCUMENT_KEY, b"{\"profile\": {").unwrap();
    let store = store_on(&medium);

    assert_eq!(store.read(), Document::new());
    // The slot still holds data, so it counts as committed.
    assert!(store.has_data().unwrap());
}

#[test]
fn test_non_object_slot_reads_empty() {
    let medium = Arc::new(MemoryMedium::new());
    medium.write(DOCUMENT_KEY, b"[1, 2, 3]").unwrap();
    let store = store_on(&medium);

    assert_eq!(store.read(), Document::new());
}

#[test]
fn test_failed_write_keeps_previous_document() {
    let medium = Arc::new(MemoryMedium::new());
    let store = store_on(&medium);
    let original = doc_with_marker(1);
    store.replace(&original).unwrap();

    medium.reject_writes(DOCUMENT_KEY);
    let result = store.replace(&doc_with_marker(2));

    assert!(matches!(result, Err(StoreError::WriteFailed(_))));
    assert_eq!(store.read(), original);
}

#[test]
fn test_quota_exceeded_is_write_failed() {
    let medium = Arc::new(MemoryMedium::with_quota(64));
    let store = store_on(&medium);

    let big = Document::new().with("notes", json!(["x".repeat(200)]));
    match store.replace(&big) {
        Err(StoreError::WriteFailed(e)) => {
            assert_eq!(e.kind(), std::io::ErrorKind::StorageFull);
        }
        other => panic!("expected WriteFailed, got {other:?}"),
    }
    assert!(!store.has_data().unwrap());
}

#[test]
fn test_replace_touches_only_document_slot() {
    let medium = Arc::new(MemoryMedium::new());
    medium.write(RING_KEY, b"sentinel").unwrap();
    let store = store_on(&medium);

    store.replace(&doc_with_marker(3)).unwrap();

    assert_eq!(medium.read(RING_KEY).unwrap().unwrap(), b"sentinel");
}

#[test]
fn test_unknown_fields_round_trip() {
    let medium = Arc::new(MemoryMedium::new());
    let store = store_on(&medium);
    let doc = Document::new()
        .with("futureCollection", json!([{"nested": {"deep": [1, null, "x"]}}]))
        .with("schemaVersion", json!(9));

    store.replace(&doc).unwrap();

    assert_eq!(store.read(), doc);
}

#[test]
fn test_read_raw_replaces_invalid_utf8() {
    let medium = Arc::new(MemoryMedium::new());
    medium.write(DOCUMENT_KEY, b"{\"name\": \"caf\xe9\"").unwrap();
    let store = store_on(&medium);

    assert_eq!(
        store.read_raw().unwrap().as_deref(),
        Some("{\"name\": \"caf\u{FFFD}\"")
    );
    assert_eq!(store.read(), Document::new());
}
