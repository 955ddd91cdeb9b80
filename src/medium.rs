//! Durable key-value slots that the store and the ring persist into.
//!
//! Two slots are used: [`DOCUMENT_KEY`](crate::DOCUMENT_KEY) holds the live
//! document and [`RING_KEY`](crate::RING_KEY) holds the snapshot ring. A
//! write to one slot never touches the other.

use fs2::FileExt;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

/// Read/write primitives of a local persistence medium.
///
/// Implementations must make [`write`](Medium::write) all-or-nothing: when it
/// returns an error, a subsequent [`read`](Medium::read) of the same key
/// returns the previous bytes.
pub trait Medium: fmt::Debug + Send + Sync {
    /// Read the bytes stored under `key`, or `None` if the slot was never written.
    fn read(&self, key: &str) -> io::Result<Option<Vec<u8>>>;

    /// Replace the bytes stored under `key`.
    fn write(&self, key: &str, bytes: &[u8]) -> io::Result<()>;
}

/// Locking strategy for [`DirMedium`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockMode {
    /// Hold an exclusive advisory lock on the data directory for the
    /// lifetime of the medium. A second opener fails.
    #[default]
    Flock,
    /// No locking. The caller guarantees a single writer.
    None,
}

/// A directory holding one `<key>.json` file per slot.
///
/// Writes go to `<key>.json.tmp` first, are synced, then renamed over the
/// final path. If the process crashes mid-write, the old file survives
/// intact and the stray `.tmp` is ignored.
///
/// ```text
/// data/
/// ├── safekeep.lock
/// ├── current-document.json
/// └── snapshot-ring.json
/// ```
pub struct DirMedium {
    dir: PathBuf,
    lock: Option<File>,
}

impl fmt::Debug for DirMedium {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirMedium")
            .field("dir", &self.dir)
            .field("locked", &self.lock.is_some())
            .finish()
    }
}

impl DirMedium {
    /// Name of the lock file inside the data directory.
    pub const LOCK_FILE: &'static str = "safekeep.lock";

    /// Open or create the directory and take the exclusive lock.
    pub fn open(dir: impl AsRef<Path>) -> io::Result<Self> {
        Self::open_with_lock(dir, LockMode::Flock)
    }

    /// Open or create the directory with an explicit locking strategy.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::AlreadyExists`] if another `DirMedium` holds
    /// the lock on the same directory.
    pub fn open_with_lock(dir: impl AsRef<Path>, mode: LockMode) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let lock = match mode {
            LockMode::Flock => Some(acquire_lock(&dir.join(Self::LOCK_FILE))?),
            LockMode::None => None,
        };

        Ok(DirMedium { dir, lock })
    }

    /// Returns the data directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the file backing `key`.
    pub fn slot_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

fn acquire_lock(path: &Path) -> io::Result<File> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(path)?;

    match file.try_lock_exclusive() {
        Ok(()) => Ok(file),
        Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
            Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("another writer holds the lock on {}", path.display()),
            ))
        }
        Err(e) => Err(e),
    }
}

impl Medium for DirMedium {
    fn read(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.slot_path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, key: &str, bytes: &[u8]) -> io::Result<()> {
        let path = self.slot_path(key);
        let tmp_path = path.with_extension("json.tmp");

        let result = (|| {
            let mut file = File::create(&tmp_path)?;
            file.write_all(bytes)?;
            file.sync_data()?;
            drop(file);
            fs::rename(&tmp_path, &path)
        })();

        if result.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        result
    }
}

/// An in-process medium, for hosts without a filesystem and for tests.
///
/// Optionally enforces a byte quota across all slots, the way browser local
/// storage does, and can be told to reject writes to specific keys.
#[derive(Debug, Default)]
pub struct MemoryMedium {
    slots: RwLock<HashMap<String, Vec<u8>>>,
    rejected: RwLock<HashSet<String>>,
    quota: Option<usize>,
}

impl MemoryMedium {
    /// Create an empty medium with no quota.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty medium that refuses writes pushing total usage past
    /// `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        MemoryMedium {
            quota: Some(bytes),
            ..Self::default()
        }
    }

    /// Make every subsequent write to `key` fail.
    pub fn reject_writes(&self, key: &str) {
        self.rejected
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string());
    }

    /// Undo [`reject_writes`](Self::reject_writes).
    pub fn accept_writes(&self, key: &str) {
        self.rejected
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    /// Total bytes held across all slots.
    pub fn bytes_used(&self) -> usize {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Vec::len)
            .sum()
    }
}

impl Medium for MemoryMedium {
    fn read(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        Ok(slots.get(key).cloned())
    }

    fn write(&self, key: &str, bytes: &[u8]) -> io::Result<()> {
        if self
            .rejected
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
        {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("writes to {key} are rejected"),
            ));
        }

        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(quota) = self.quota {
            let used: usize = slots.values().map(Vec::len).sum();
            let replaced = slots.get(key).map_or(0, Vec::len);
            if used - replaced + bytes.len() > quota {
                return Err(io::Error::new(
                    io::ErrorKind::StorageFull,
                    format!("quota of {quota} bytes exceeded writing {key}"),
                ));
            }
        }
        slots.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }
}
