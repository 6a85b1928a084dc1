//! File-based storage for native environments.
//!
//! The store is written to a sibling temporary file first and then renamed over
//! the target, so a crash mid-write leaves either the old or the new file.

use super::{StorageError, StoreBackend};
use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

/// File-based backend that persists the store as a single JSON file.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Creates a new instance of [`FileStorage`].
    ///
    /// # Arguments
    ///
    /// * `path` - The file the store is written to. Missing parent directories are
    ///   created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The directory temporary files are created in: the parent of `path`, created
    /// if missing.
    fn ensure_parent(&self) -> Result<&Path, StorageError> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                fs::create_dir_all(parent)?;
                Ok(parent)
            }
            _ => Ok(Path::new(".")), // current directory
        }
    }

    fn temp_prefix(&self) -> Result<String, StorageError> {
        let file_name = self
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                StorageError::File(format!("invalid store path {}", self.path.display()))
            })?;
        Ok(format!(".{file_name}."))
    }
}

impl StoreBackend for FileStorage {
    fn read(&mut self) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::from(e)),
        }
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), StorageError> {
        let prefix = self.temp_prefix()?;
        let directory = self.ensure_parent()?;

        // Every write gets its own uniquely named sibling, removed on drop if the
        // rename below never happens.
        let mut temp = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".tmp")
            .tempfile_in(directory)?;
        temp.write_all(bytes)?;
        temp.as_file().sync_all()?;

        temp.persist(&self.path).map_err(|e| {
            StorageError::File(format!(
                "failed to finalize {}: {}",
                self.path.display(),
                e.error
            ))
        })?;
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

impl From<FileStorage> for Box<dyn StoreBackend> {
    fn from(storage: FileStorage) -> Self {
        Box::new(storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut storage = FileStorage::new(dir.path().join("users.json"));
        assert!(storage.read().expect("read").is_none());
    }

    #[test]
    fn write_creates_parent_and_replaces_contents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("users.json");
        let mut storage = FileStorage::new(&path);

        storage.write(b"first").expect("first write");
        storage.write(b"second").expect("second write");

        assert_eq!(fs::read(&path).expect("read file"), b"second");
        assert_eq!(storage.read().expect("read").as_deref(), Some(&b"second"[..]));
    }

    #[test]
    fn write_leaves_no_temporary_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut storage = FileStorage::new(dir.path().join("users.json"));
        storage.write(b"{}").expect("write");

        let names: Vec<_> = fs::read_dir(dir.path())
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name())
            .collect();
        assert_eq!(names, ["users.json"]);
    }

    #[test]
    fn instances_sharing_a_path_never_tear_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("users.json");
        let payloads = [vec![b'a'; 64 * 1024], vec![b'b'; 32 * 1024]];

        let handles: Vec<_> = payloads
            .iter()
            .cloned()
            .map(|payload| {
                let mut storage = FileStorage::new(&path);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        storage.write(&payload).expect("write");
                    }
                })
            })
            .collect();

        let mut reader = FileStorage::new(&path);
        for _ in 0..200 {
            if let Some(contents) = reader.read().expect("read") {
                assert!(payloads.contains(&contents), "torn read of {} bytes", contents.len());
            }
        }
        for handle in handles {
            handle.join().expect("writer thread");
        }

        let contents = reader.read().expect("read").expect("written");
        assert!(payloads.contains(&contents));
        let names: Vec<_> = fs::read_dir(dir.path())
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name())
            .collect();
        assert_eq!(names, ["users.json"]);
    }

    #[test]
    fn directory_in_place_of_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut storage = FileStorage::new(dir.path());
        assert!(storage.read().is_err());
    }
}
