use crate::document::Document;
use crate::error::StoreError;
use crate::medium::Medium;
use crate::validate;
use log::{debug, warn};
use std::sync::Arc;

/// Slot holding the live document.
pub const DOCUMENT_KEY: &str = "current-document";

/// The single source of truth for the current document.
///
/// Cheap to clone: clones share the same medium. Only [`replace`] writes,
/// and it writes only the document slot.
///
/// [`replace`]: DocumentStore::replace
#[derive(Debug, Clone)]
pub struct DocumentStore {
    medium: Arc<dyn Medium>,
}

impl DocumentStore {
    pub fn new(medium: Arc<dyn Medium>) -> Self {
        DocumentStore { medium }
    }

    /// Return the current document.
    ///
    /// Never fails. An absent, unreadable, or corrupt slot reads as an empty
    /// document, since this is the baseline state and not an archive.
    pub fn read(&self) -> Document {
        let text = match self.read_raw() {
            Ok(Some(text)) => text,
            Ok(None) => return Document::new(),
            Err(e) => {
                warn!("safekeep: {e}, reading as empty document");
                return Document::new();
            }
        };

        match validate::validate(text.as_bytes()) {
            Ok(doc) => doc,
            Err(e) => {
                warn!("safekeep: current document is corrupt ({e}), reading as empty document");
                Document::new()
            }
        }
    }

    /// Return the committed document text, or `None` if nothing has ever
    /// been committed.
    ///
    /// Valid UTF-8 comes back byte for byte. Invalid sequences are replaced
    /// with U+FFFD; such a slot can never parse as a document anyway.
    pub fn read_raw(&self) -> Result<Option<String>, StoreError> {
        let bytes = self
            .medium
            .read(DOCUMENT_KEY)
            .map_err(StoreError::ReadFailed)?;
        Ok(bytes.map(|b| match String::from_utf8(b) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        }))
    }

    /// Returns `true` once any document has been committed.
    pub fn has_data(&self) -> Result<bool, StoreError> {
        Ok(self.read_raw()?.is_some())
    }

    /// Atomically make `doc` the current document.
    ///
    /// # Errors
    ///
    /// [`StoreError::WriteFailed`] if the medium rejects the write. The
    /// previous document remains current.
    pub fn replace(&self, doc: &Document) -> Result<(), StoreError> {
        let json = doc.to_json().map_err(StoreError::Serialize)?;
        self.medium
            .write(DOCUMENT_KEY, json.as_bytes())
            .map_err(StoreError::WriteFailed)?;
        debug!("safekeep: committed document ({} bytes)", json.len());
        Ok(())
    }

    pub(crate) fn medium(&self) -> &Arc<dyn Medium> {
        &self.medium
    }
}
