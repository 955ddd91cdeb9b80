#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use safekeep::{Clock, Document, ExportSchema, MemoryMedium, Vault};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// A clock that starts at 2024-03-09 08:00 UTC and advances one minute per call.
#[derive(Debug)]
pub struct StepClock {
    minutes: AtomicI64,
}

impl StepClock {
    pub fn new() -> Self {
        StepClock {
            minutes: AtomicI64::new(0),
        }
    }

    pub fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 8, 0, 0).unwrap()
    }
}

impl Clock for StepClock {
    fn now(&self) -> DateTime<Utc> {
        let n = self.minutes.fetch_add(1, Ordering::SeqCst);
        Self::start() + Duration::minutes(n)
    }
}

pub fn school_schema() -> ExportSchema {
    ExportSchema::default()
        .with_owner_scoped("violations", "teacherId")
        .with_owner_scoped("students", "teacherId")
}

/// A vault on an in-memory medium. The medium is returned for fault injection.
pub fn memory_vault() -> (Arc<MemoryMedium>, Vault) {
    let medium = Arc::new(MemoryMedium::new());
    let vault = Vault::builder_on(medium.clone())
        .clock(StepClock::new())
        .schema(school_schema())
        .open()
        .unwrap();
    (medium, vault)
}

/// A document with one distinguishing marker, for telling generations apart.
pub fn doc_with_marker(marker: u64) -> Document {
    Document::new()
        .with("profile", json!({"school": "North", "marker": marker}))
        .with("violations", json!([{"id": marker, "teacherId": "teacherX"}]))
}

pub fn marker_of(doc: &Document) -> Option<u64> {
    doc.get("profile")?.get("marker")?.as_u64()
}

pub fn doc_bytes(doc: &Document) -> Vec<u8> {
    doc.to_json().unwrap().into_bytes()
}

/// Two teachers' records across owner-scoped collections, plus context and
/// an unscoped collection.
pub fn two_teacher_doc() -> Document {
    Document::new()
        .with("profile", json!({"school": "North", "year": 2024}))
        .with(
            "violations",
            json!([
                {"id": 1, "teacherId": "teacherX", "kind": "late"},
                {"id": 2, "teacherId": "teacherY", "kind": "uniform"},
                {"id": 3, "teacherId": "teacherX", "kind": "phone"},
            ]),
        )
        .with(
            "students",
            json!([
                {"name": "Ana", "teacherId": "teacherX"},
                {"name": "Ben", "teacherId": "teacherY"},
            ]),
        )
        .with("settings", json!({"theme": "dark"}))
        .with("auditLog", json!(["boot", "login"]))
}
