use crate::document::Document;
use crate::error::{GuardError, RingError};
use crate::ring::{SnapshotId, SnapshotRing};
use crate::store::DocumentStore;
use log::{debug, info, warn};

/// Note attached to the snapshot taken before an import.
pub const IMPORT_NOTE: &str = "pre-import archival";

/// Note attached to the snapshot taken before a restore.
pub const RESTORE_NOTE: &str = "pre-restore archival";

/// Sole writer of the current document.
///
/// Every replacement follows the same protocol: snapshot the current
/// document, then replace it. The snapshot is durable before the replacement
/// is attempted, so an import or restore never loses the document it
/// replaces.
#[derive(Debug)]
pub struct MutationGuard {
    store: DocumentStore,
    ring: SnapshotRing,
}

impl MutationGuard {
    pub fn new(store: DocumentStore, ring: SnapshotRing) -> Self {
        MutationGuard { store, ring }
    }

    /// Archive the current document under `note`, then commit `candidate`.
    ///
    /// Returns the id of the archival snapshot, or `None` when there was no
    /// committed document to archive.
    ///
    /// # Errors
    ///
    /// - [`GuardError::SnapshotFailed`] if archiving failed. Nothing was
    ///   replaced.
    /// - [`GuardError::ReplaceFailed`] if the write failed after archiving.
    ///   The previous document is still current and its snapshot is kept.
    pub fn apply_replacement(
        &mut self,
        candidate: &Document,
        note: &str,
    ) -> Result<Option<SnapshotId>, GuardError> {
        let archived = match self.ring.capture(note) {
            Ok(id) => Some(id),
            Err(RingError::NoCurrentData) => {
                debug!("safekeep: no committed document, skipping archival snapshot");
                None
            }
            Err(e) => return Err(GuardError::SnapshotFailed(e)),
        };

        if let Err(e) = self.store.replace(candidate) {
            if let Some(id) = &archived {
                warn!("safekeep: replacement failed after archiving {id}: {e}");
            }
            return Err(GuardError::ReplaceFailed(e));
        }

        Ok(archived)
    }

    /// Make snapshot `id`'s payload the current document, archiving the
    /// current one first under [`RESTORE_NOTE`].
    ///
    /// Returns the id of the archival snapshot, as for
    /// [`apply_replacement`](Self::apply_replacement).
    ///
    /// # Errors
    ///
    /// [`GuardError::SnapshotFailed`] wrapping [`RingError::NotFound`] if
    /// `id` is not retained; otherwise as for `apply_replacement`.
    pub fn restore_snapshot(&mut self, id: &SnapshotId) -> Result<Option<SnapshotId>, GuardError> {
        let payload = self
            .ring
            .restore_payload(id)
            .map_err(GuardError::SnapshotFailed)?;
        let archived = self.apply_replacement(&payload, RESTORE_NOTE)?;
        info!("safekeep: restored snapshot {id}");
        Ok(archived)
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn ring(&self) -> &SnapshotRing {
        &self.ring
    }
}
