//! Error types for each layer, plus the coarse classification hosts show users.

use crate::ring::SnapshotId;
use std::io;
use thiserror::Error;

/// Failure reading or writing the current-document slot.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The medium could not be read (I/O failure, not "slot missing").
    #[error("failed to read current document: {0}")]
    ReadFailed(#[source] io::Error),

    /// The medium rejected the write (quota exceeded, disk full, ...).
    /// The previous document is still current.
    #[error("failed to write current document: {0}")]
    WriteFailed(#[source] io::Error),

    #[error("failed to serialize document: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Failure inside the snapshot ring.
#[derive(Debug, Error)]
pub enum RingError {
    /// No document has ever been committed, so there is nothing to protect.
    /// Callers treat this as "skip the snapshot and proceed".
    #[error("no current document has been committed, nothing to snapshot")]
    NoCurrentData,

    /// The current document exists but could not be read for archiving.
    #[error("could not read current document for archiving: {0}")]
    CurrentUnreadable(#[source] StoreError),

    /// The updated ring could not be written. The in-memory ring is unchanged.
    #[error("failed to persist snapshot ring: {0}")]
    PersistFailed(#[source] io::Error),

    /// The id was evicted or never existed.
    #[error("snapshot {0} not found")]
    NotFound(SnapshotId),

    /// The stored payload fails its checksum or no longer parses.
    #[error("snapshot {id} is corrupt: {reason}")]
    CorruptPayload { id: SnapshotId, reason: String },

    #[error("failed to serialize snapshot ring: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Failure of a guarded mutation. In both cases the current document is
/// exactly what it was before the call.
#[derive(Debug, Error)]
pub enum GuardError {
    /// Archiving (or looking up the restore target) failed; nothing was replaced.
    #[error("snapshot step failed, nothing was replaced: {0}")]
    SnapshotFailed(#[source] RingError),

    /// The archival snapshot was taken but the new document was not committed.
    #[error("replacement failed, current document unchanged: {0}")]
    ReplaceFailed(#[source] StoreError),
}

/// Rejection of an untrusted import payload.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Declared media type and file extension both say "not JSON".
    #[error("wrong file kind: {file_name} is not a JSON document")]
    WrongFileKind { file_name: String },

    #[error("malformed document: {0}")]
    MalformedSyntax(#[source] serde_json::Error),

    /// Parsed, but the top level is not an object.
    #[error("document must be a JSON object, found {found}")]
    WrongShape { found: &'static str },
}

/// Any error surfaced by [`Vault`](crate::Vault).
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error(transparent)]
    Ring(#[from] RingError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to serialize export: {0}")]
    Export(#[source] serde_json::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// What a user-facing layer needs to know about a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The supplied file was bad. User-correctable.
    Parse,
    /// The environment failed (storage full, I/O error, corrupt archive).
    /// The requested operation was aborted with no state change.
    Persistence,
    /// The referenced snapshot no longer exists.
    NotFound,
}

impl Error {
    /// Classify this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use safekeep::{Error, ErrorKind, ValidationError};
    ///
    /// let err = Error::from(ValidationError::WrongShape { found: "array" });
    /// assert_eq!(err.kind(), ErrorKind::Parse);
    /// ```
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Parse,
            Error::Guard(GuardError::SnapshotFailed(ring)) | Error::Ring(ring) => ring.kind(),
            Error::Guard(GuardError::ReplaceFailed(_))
            | Error::Store(_)
            | Error::Export(_)
            | Error::Io(_) => ErrorKind::Persistence,
        }
    }
}

impl RingError {
    fn kind(&self) -> ErrorKind {
        match self {
            RingError::NotFound(_) => ErrorKind::NotFound,
            _ => ErrorKind::Persistence,
        }
    }
}

/// Result alias for [`Vault`](crate::Vault) operations.
pub type Result<T> = std::result::Result<T, Error>;
