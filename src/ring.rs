//! Bounded, newest-first history of full-document snapshots.

use crate::clock::Clock;
use crate::document::Document;
use crate::error::RingError;
use crate::store::DocumentStore;
use crate::validate;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// Slot holding the persisted ring.
pub const RING_KEY: &str = "snapshot-ring";

/// Slot receiving the bytes of a ring file that failed to parse.
pub const RING_QUARANTINE_KEY: &str = "snapshot-ring-corrupt";

/// Maximum number of snapshots retained. Older ones are evicted FIFO.
pub const RING_CAPACITY: usize = 5;

/// Opaque, lifetime-unique snapshot identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(String);

impl SnapshotId {
    fn derive(sequence: u64, checksum: &str) -> Self {
        let tag = checksum.get(..8).unwrap_or(checksum);
        SnapshotId(format!("snap-{sequence:06}-{tag}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SnapshotId {
    fn from(s: &str) -> Self {
        SnapshotId(s.to_string())
    }
}

impl From<String> for SnapshotId {
    fn from(s: String) -> Self {
        SnapshotId(s)
    }
}

/// An immutable copy of the current document, taken just before a
/// destructive replacement.
///
/// `payload` is the document text exactly as it was persisted at capture
/// time. `checksum` is the hex xxh64 of that text and is verified before the
/// payload is handed back for a restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Snapshot {
    pub id: SnapshotId,

    /// Monotonic across the lifetime of the ring; never reused after eviction.
    pub sequence: u64,

    pub timestamp: DateTime<Utc>,

    /// Free-text annotation such as `"pre-import archival"`.
    #[serde(default)]
    pub note: String,

    pub payload: String,

    /// Empty for entries written without one; those skip verification.
    #[serde(default)]
    pub checksum: String,
}

impl Snapshot {
    /// Metadata without the payload body.
    pub fn info(&self) -> SnapshotInfo {
        SnapshotInfo {
            id: self.id.clone(),
            sequence: self.sequence,
            timestamp: self.timestamp,
            note: self.note.clone(),
            size: self.payload.len(),
        }
    }
}

/// Listing entry for a snapshot. Cheap to enumerate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotInfo {
    pub id: SnapshotId,
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub note: String,
    /// Payload length in bytes.
    pub size: usize,
}

/// Compute xxh64 of a payload, hex-encoded.
pub fn payload_checksum(payload: &str) -> String {
    let hash = xxhash_rust::xxh64::xxh64(payload.as_bytes(), 0);
    format!("{hash:016x}")
}

#[derive(Serialize)]
struct RingFileRef<'a> {
    next_sequence: u64,
    snapshots: &'a VecDeque<Snapshot>,
}

#[derive(Deserialize)]
struct RingFile {
    #[serde(default)]
    next_sequence: u64,
    #[serde(default)]
    snapshots: Vec<Snapshot>,
}

/// The snapshot ring.
///
/// Holds at most [`RING_CAPACITY`] snapshots, newest first. The persisted
/// form also records the next sequence number, so sequences stay unique
/// across restarts even after the entry that carried the highest one has
/// been evicted.
#[derive(Debug)]
pub struct SnapshotRing {
    store: DocumentStore,
    clock: Arc<dyn Clock>,
    entries: VecDeque<Snapshot>,
    next_sequence: u64,
}

impl SnapshotRing {
    /// Load the ring persisted alongside `store`.
    ///
    /// A missing ring slot yields an empty ring. A corrupt one is copied to
    /// [`RING_QUARANTINE_KEY`] and the ring starts empty, so the next capture
    /// can overwrite the slot without destroying the damaged archives.
    ///
    /// # Errors
    ///
    /// [`RingError::PersistFailed`] if the medium cannot be read, or if a
    /// corrupt ring cannot be copied aside.
    pub fn open(store: DocumentStore, clock: Arc<dyn Clock>) -> Result<Self, RingError> {
        let bytes = store
            .medium()
            .read(RING_KEY)
            .map_err(RingError::PersistFailed)?;

        let file = match bytes {
            None => None,
            Some(bytes) => match serde_json::from_slice::<RingFile>(&bytes) {
                Ok(file) => Some(file),
                Err(e) => {
                    store
                        .medium()
                        .write(RING_QUARANTINE_KEY, &bytes)
                        .map_err(RingError::PersistFailed)?;
                    warn!(
                        "safekeep: snapshot ring is corrupt ({e}), copied to \
                         {RING_QUARANTINE_KEY} and starting empty"
                    );
                    None
                }
            },
        };

        let (mut snapshots, recorded_next) = match file {
            Some(file) => (file.snapshots, file.next_sequence),
            None => (Vec::new(), 0),
        };

        snapshots.sort_by(|a, b| b.sequence.cmp(&a.sequence));
        snapshots.truncate(RING_CAPACITY);

        let next_sequence = snapshots
            .first()
            .map_or(1, |newest| newest.sequence + 1)
            .max(recorded_next)
            .max(1);

        Ok(SnapshotRing {
            store,
            clock,
            entries: snapshots.into(),
            next_sequence,
        })
    }

    /// Snapshot the current document under `note`.
    ///
    /// The new entry goes to the head; if that pushes the ring past
    /// [`RING_CAPACITY`], the oldest entry is evicted. The ring is persisted
    /// before the in-memory state changes, so a failed write leaves it
    /// exactly as it was.
    ///
    /// # Errors
    ///
    /// - [`RingError::NoCurrentData`] if no document was ever committed. No
    ///   snapshot is taken and no sequence number is consumed.
    /// - [`RingError::CurrentUnreadable`] if the document slot cannot be read.
    /// - [`RingError::PersistFailed`] if the ring cannot be written.
    pub fn capture(&mut self, note: &str) -> Result<SnapshotId, RingError> {
        let payload = self
            .store
            .read_raw()
            .map_err(RingError::CurrentUnreadable)?
            .ok_or(RingError::NoCurrentData)?;

        let sequence = self.next_sequence;
        let checksum = payload_checksum(&payload);
        let snapshot = Snapshot {
            id: SnapshotId::derive(sequence, &checksum),
            sequence,
            timestamp: self.clock.now(),
            note: note.to_string(),
            payload,
            checksum,
        };
        let id = snapshot.id.clone();

        let mut entries = self.entries.clone();
        entries.push_front(snapshot);
        let mut evicted = Vec::new();
        while entries.len() > RING_CAPACITY {
            if let Some(old) = entries.pop_back() {
                evicted.push(old.id);
            }
        }

        self.persist(&entries, sequence + 1)?;

        self.entries = entries;
        self.next_sequence = sequence + 1;
        for old in evicted {
            debug!("safekeep: evicted snapshot {old}");
        }
        info!("safekeep: captured snapshot {id} ({note})");
        Ok(id)
    }

    /// Metadata for every retained snapshot, newest first.
    pub fn list(&self) -> Vec<SnapshotInfo> {
        self.entries.iter().map(Snapshot::info).collect()
    }

    /// Look up and parse the payload of snapshot `id`.
    ///
    /// # Errors
    ///
    /// - [`RingError::NotFound`] if `id` was evicted or never existed.
    /// - [`RingError::CorruptPayload`] if the payload fails its checksum or
    ///   does not parse as a document.
    pub fn restore_payload(&self, id: &SnapshotId) -> Result<Document, RingError> {
        let snapshot = self
            .get(id)
            .ok_or_else(|| RingError::NotFound(id.clone()))?;

        if !snapshot.checksum.is_empty() && payload_checksum(&snapshot.payload) != snapshot.checksum
        {
            return Err(RingError::CorruptPayload {
                id: id.clone(),
                reason: "checksum mismatch".to_string(),
            });
        }

        validate::validate(snapshot.payload.as_bytes()).map_err(|e| RingError::CorruptPayload {
            id: id.clone(),
            reason: e.to_string(),
        })
    }

    pub fn get(&self, id: &SnapshotId) -> Option<&Snapshot> {
        self.entries.iter().find(|s| &s.id == id)
    }

    /// The most recently captured snapshot.
    pub fn latest(&self) -> Option<&Snapshot> {
        self.entries.front()
    }

    /// Retained snapshots, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The sequence number the next capture will receive.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    fn persist(&self, entries: &VecDeque<Snapshot>, next_sequence: u64) -> Result<(), RingError> {
        let file = RingFileRef {
            next_sequence,
            snapshots: entries,
        };
        let json = serde_json::to_vec_pretty(&file).map_err(RingError::Serialize)?;
        self.store
            .medium()
            .write(RING_KEY, &json)
            .map_err(RingError::PersistFailed)
    }
}
