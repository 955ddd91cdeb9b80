use crate::clock::{Clock, SystemClock};
use crate::document::Document;
use crate::error::{Error, Result};
use crate::export::{
    EXPORT_MEDIA_TYPE, ExportFile, ExportFilter, ExportSchema, ExportScope, export_file_name,
};
use crate::guard::{IMPORT_NOTE, MutationGuard};
use crate::medium::{DirMedium, LockMode, Medium};
use crate::ring::{SnapshotId, SnapshotInfo, SnapshotRing};
use crate::store::DocumentStore;
use crate::validate::{self, Upload};
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};

/// Sent to subscribers after the current document has been replaced.
///
/// Consumers holding derived in-memory state should re-read
/// [`Vault::read_current`] on receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Imported {
        /// Snapshot of the replaced document, `None` on a fresh install.
        archived: Option<SnapshotId>,
    },
    Restored {
        from: SnapshotId,
        archived: Option<SnapshotId>,
    },
}

enum Backing {
    Dir(PathBuf, LockMode),
    Medium(Arc<dyn Medium>),
}

/// Builder for configuring and opening a [`Vault`].
///
/// # Examples
///
/// ```
/// use safekeep::{ExportSchema, LockMode, Vault};
///
/// let dir = tempfile::tempdir().unwrap();
/// let vault = Vault::builder(dir.path())
///     .lock_mode(LockMode::None)
///     .schema(ExportSchema::default().with_owner_scoped("violations", "teacherId"))
///     .export_prefix("school-backup")
///     .open()
///     .unwrap();
/// assert!(vault.list_snapshots().is_empty());
/// ```
pub struct VaultBuilder {
    backing: Backing,
    clock: Arc<dyn Clock>,
    schema: ExportSchema,
    export_prefix: String,
}

impl VaultBuilder {
    fn new(backing: Backing) -> Self {
        VaultBuilder {
            backing,
            clock: Arc::new(SystemClock),
            schema: ExportSchema::default(),
            export_prefix: "backup".to_string(),
        }
    }

    /// Set the locking strategy for a directory-backed vault.
    /// Ignored when the vault was built on an explicit medium.
    pub fn lock_mode(mut self, mode: LockMode) -> Self {
        if let Backing::Dir(_, lock) = &mut self.backing {
            *lock = mode;
        }
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn schema(mut self, schema: ExportSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Prefix of export file names. Defaults to `"backup"`.
    pub fn export_prefix(mut self, prefix: &str) -> Self {
        self.export_prefix = prefix.to_string();
        self
    }

    /// Open the vault, loading the persisted ring.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be created, another writer holds the
    /// lock ([`std::io::ErrorKind::AlreadyExists`]), or the ring slot cannot
    /// be read.
    pub fn open(self) -> Result<Vault> {
        let medium: Arc<dyn Medium> = match self.backing {
            Backing::Dir(dir, mode) => Arc::new(DirMedium::open_with_lock(dir, mode)?),
            Backing::Medium(medium) => medium,
        };

        let store = DocumentStore::new(medium);
        let ring = SnapshotRing::open(store.clone(), Arc::clone(&self.clock))?;

        Ok(Vault {
            guard: MutationGuard::new(store, ring),
            filter: ExportFilter::new(self.schema),
            clock: self.clock,
            export_prefix: self.export_prefix,
            subscribers: Vec::new(),
        })
    }
}

/// Entry point for hosts: read, export, import, and restore the document.
///
/// Reads and exports borrow the vault immutably. Imports and restores take
/// `&mut self`, so they can never interleave within a process; across
/// processes the directory lock keeps a single writer.
///
/// The document store is not handed out, so every change goes through an
/// import or restore and is archived first:
///
/// ```compile_fail
/// let vault = safekeep::Vault::open("data").unwrap();
/// vault.store().replace(&safekeep::Document::new()).unwrap();
/// ```
///
/// # Examples
///
/// ```
/// use safekeep::{ExportScope, Upload, Vault};
///
/// let dir = tempfile::tempdir().unwrap();
/// let mut vault = Vault::open(dir.path()).unwrap();
///
/// // Fresh install: nothing to archive.
/// let archived = vault.request_import(&Upload::new("a.json", r#"{"students": [1]}"#)).unwrap();
/// assert_eq!(archived, None);
///
/// // Second import archives the first document.
/// let archived = vault.request_import(&Upload::new("b.json", r#"{"students": [2]}"#)).unwrap();
/// assert!(archived.is_some());
/// assert_eq!(vault.list_snapshots().len(), 1);
///
/// // Restoring brings the first document back and archives the second.
/// vault.request_restore(&archived.unwrap()).unwrap();
/// assert_eq!(vault.read_current().collection("students"), &[serde_json::json!(1)]);
/// assert_eq!(vault.list_snapshots().len(), 2);
///
/// let export = vault.request_export(&ExportScope::Full).unwrap();
/// assert!(export.file_name.ends_with(".json"));
/// ```
pub struct Vault {
    guard: MutationGuard,
    filter: ExportFilter,
    clock: Arc<dyn Clock>,
    export_prefix: String,
    subscribers: Vec<Sender<Change>>,
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("guard", &self.guard)
            .field("filter", &self.filter)
            .field("export_prefix", &self.export_prefix)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl Vault {
    /// Create a builder for a vault persisted in `dir`.
    pub fn builder(dir: impl AsRef<Path>) -> VaultBuilder {
        VaultBuilder::new(Backing::Dir(dir.as_ref().to_path_buf(), LockMode::default()))
    }

    /// Create a builder for a vault persisted in an explicit medium.
    pub fn builder_on(medium: Arc<dyn Medium>) -> VaultBuilder {
        VaultBuilder::new(Backing::Medium(medium))
    }

    /// Open a vault in `dir` with default settings.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        Self::builder(dir).open()
    }

    /// Return the current document. Never fails.
    pub fn read_current(&self) -> Document {
        self.guard.store().read()
    }

    /// Retained snapshots, newest first, without payloads.
    pub fn list_snapshots(&self) -> Vec<SnapshotInfo> {
        self.guard.ring().list()
    }

    /// Serialize the slice of the current document selected by `scope`.
    ///
    /// Read-only: never touches the document or the ring.
    pub fn request_export(&self, scope: &ExportScope) -> Result<ExportFile> {
        let doc = self.filter.project(&self.read_current(), scope);
        let contents = doc.to_json().map_err(Error::Export)?;
        let file_name = export_file_name(&self.export_prefix, scope, self.clock.now().date_naive());
        Ok(ExportFile {
            file_name,
            media_type: EXPORT_MEDIA_TYPE,
            contents,
        })
    }

    /// Validate `upload` and make it the current document, archiving the
    /// current one first.
    ///
    /// The file kind and content are checked before anything is archived, so
    /// a bad file leaves the document and the ring untouched. Returns the id
    /// of the archival snapshot, or `None` when there was nothing to archive.
    pub fn request_import(&mut self, upload: &Upload) -> Result<Option<SnapshotId>> {
        validate::check_file_kind(upload)?;
        self.import_bytes(&upload.bytes)
    }

    /// Like [`request_import`](Self::request_import) for a payload with no
    /// file metadata.
    pub fn import_bytes(&mut self, raw: &[u8]) -> Result<Option<SnapshotId>> {
        let candidate = validate::validate(raw)?;
        let archived = self.guard.apply_replacement(&candidate, IMPORT_NOTE)?;
        match &archived {
            Some(id) => info!("safekeep: imported document, previous archived as {id}"),
            None => info!("safekeep: imported document into empty store"),
        }
        self.notify(Change::Imported {
            archived: archived.clone(),
        });
        Ok(archived)
    }

    /// Make snapshot `id` the current document, archiving the current one
    /// first.
    pub fn request_restore(&mut self, id: &SnapshotId) -> Result<Option<SnapshotId>> {
        let archived = self.guard.restore_snapshot(id)?;
        self.notify(Change::Restored {
            from: id.clone(),
            archived: archived.clone(),
        });
        Ok(archived)
    }

    /// Receive a [`Change`] after every successful import or restore.
    pub fn subscribe(&mut self) -> Receiver<Change> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn ring(&self) -> &SnapshotRing {
        self.guard.ring()
    }

    pub fn filter(&self) -> &ExportFilter {
        &self.filter
    }

    fn notify(&mut self, change: Change) {
        self.subscribers.retain(|tx| tx.send(change.clone()).is_ok());
    }
}
