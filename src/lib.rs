mod clock;
mod document;
mod error;
mod export;
mod guard;
pub mod medium;
mod ring;
mod store;
mod validate;
mod vault;

pub use clock::{Clock, SystemClock};
pub use document::Document;
pub use error::{Error, ErrorKind, GuardError, Result, RingError, StoreError, ValidationError};
pub use export::{
    EXPORT_MEDIA_TYPE, ExportFile, ExportFilter, ExportSchema, ExportScope, export_file_name,
};
pub use guard::{IMPORT_NOTE, MutationGuard, RESTORE_NOTE};
pub use medium::{DirMedium, LockMode, Medium, MemoryMedium};
pub use ring::{
    RING_CAPACITY, RING_KEY, RING_QUARANTINE_KEY, Snapshot, SnapshotId, SnapshotInfo,
    SnapshotRing, payload_checksum,
};
pub use store::{DOCUMENT_KEY, DocumentStore};
pub use validate::{Upload, check_file_kind, validate};
pub use vault::{Change, Vault, VaultBuilder};
