//! File-based storage backend for persistent storage.

use crate::backend::{RecordKey, StorageBackend};
use crate::error::{StorageError, StorageResult};
use crate::tables::{StoredEntry, Tables};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// A file-based storage backend.
///
/// The committed state is kept in memory and written to disk as one CBOR
/// snapshot on every commit. Data survives process restarts.
///
/// # Durability
///
/// - `commit()` writes the next snapshot to a sibling temporary file,
///   calls `File::sync_all()` and atomically renames it over the data file
/// - A crash mid-commit leaves the previous snapshot intact
///
/// # Example
///
/// ```no_run
/// use kinsync_storage::{StorageBackend, FileBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::open(Path::new("store.cbor")).unwrap();
/// backend.insert("family", [1u8; 16], b"payload".to_vec()).unwrap();
/// backend.commit().unwrap();  // Durable from here on
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    tables: Tables,
}

impl FileBackend {
    /// Opens or creates a file backend at the given path.
    ///
    /// If the file exists, its last committed snapshot is loaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is corrupted.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let tables = if path.exists() && fs::metadata(path)?.len() > 0 {
            let reader = BufReader::new(File::open(path)?);
            let entries: Vec<StoredEntry> = ciborium::from_reader(reader)
                .map_err(|e| StorageError::Corrupted(e.to_string()))?;
            Tables::from_entries(entries)
        } else {
            Tables::default()
        };

        Ok(Self {
            path: path.to_path_buf(),
            tables,
        })
    }

    /// Opens or creates a file backend, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the file cannot be read.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_snapshot(&self, entries: &[StoredEntry]) -> StorageResult<()> {
        let temp = self.temp_path();
        {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp)?;
            let mut writer = BufWriter::new(file);
            ciborium::into_writer(entries, &mut writer)
                .map_err(|e| StorageError::Encoding(e.to_string()))?;
            writer.flush()?;
            writer
                .into_inner()
                .map_err(|e| StorageError::Io(e.into_error()))?
                .sync_all()?;
        }
        fs::rename(&temp, &self.path)?;
        Ok(())
    }
}

impl StorageBackend for FileBackend {
    fn insert(&mut self, collection: &str, key: RecordKey, value: Vec<u8>) -> StorageResult<()> {
        self.tables.insert(collection, key, value);
        Ok(())
    }

    fn get(&self, collection: &str, key: &RecordKey) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.tables.get(collection, key))
    }

    fn query(
        &self,
        collection: &str,
        predicate: &dyn Fn(&RecordKey, &[u8]) -> bool,
    ) -> StorageResult<Vec<(RecordKey, Vec<u8>)>> {
        Ok(self.tables.query(collection, predicate))
    }

    fn delete(&mut self, collection: &str, key: &RecordKey) -> StorageResult<bool> {
        Ok(self.tables.delete(collection, key))
    }

    fn commit(&mut self) -> StorageResult<()> {
        if !self.tables.has_pending() {
            return Ok(());
        }
        // Only apply in memory once the snapshot is on disk.
        let entries = self.tables.preview_commit();
        self.write_snapshot(&entries)?;
        self.tables.apply_staged();
        Ok(())
    }

    fn rollback(&mut self) -> StorageResult<()> {
        self.tables.discard_staged();
        Ok(())
    }

    fn has_pending(&self) -> bool {
        self.tables.has_pending()
    }
}
