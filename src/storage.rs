//! Persistence backends for the credential store.
//!
//! A backend stores one opaque byte blob: the serialized store. [`FileStorage`]
//! keeps it on disk, [`MemoryStorage`] keeps it in memory for tests and for
//! embedders without a writable filesystem.

use parking_lot::Mutex;
use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

pub mod file;

pub use file::FileStorage;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("File error: {0}")]
    File(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Trait for persisting the serialized credential store.
pub trait StoreBackend: Send + fmt::Debug {
    /// Reads the stored blob.
    ///
    /// # Returns
    /// * `Ok(Some(bytes))` if something has been stored
    /// * `Ok(None)` if nothing has been stored yet
    /// * `Err(StorageError)` if the backend could not be read
    fn read(&mut self) -> Result<Option<Vec<u8>>, StorageError>;

    /// Replaces the stored blob with `bytes`.
    ///
    /// Readers must observe either the previous blob or `bytes`, never a mix.
    fn write(&mut self, bytes: &[u8]) -> Result<(), StorageError>;

    /// A human-readable description of where the blob lives, for log lines.
    fn location(&self) -> String;
}

/// In-memory backend.
///
/// Clones share the same contents, so a test can keep one clone to inspect what
/// a store persisted through another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    bytes: Mutex<Option<Vec<u8>>>,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend that already holds `bytes`.
    pub fn with_contents(bytes: impl Into<Vec<u8>>) -> Self {
        let storage = Self::new();
        *storage.inner.bytes.lock() = Some(bytes.into());
        storage
    }

    /// Returns a copy of the stored blob.
    pub fn contents(&self) -> Option<Vec<u8>> {
        self.inner.bytes.lock().clone()
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    /// Makes subsequent writes fail with [`StorageError::File`].
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl StoreBackend for MemoryStorage {
    fn read(&mut self) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.contents())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), StorageError> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::File("memory storage is read-only".to_string()));
        }
        *self.inner.bytes.lock() = Some(bytes.to_vec());
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

impl From<MemoryStorage> for Box<dyn StoreBackend> {
    fn from(storage: MemoryStorage) -> Self {
        Box::new(storage)
    }
}
