//! Persistent full-text store holding one document per markup file.
//!
//! Layout is whatever the index engine writes into the store directory; a
//! committed `meta.json` in that directory is what marks the index as built.

use crate::error::{Error, Result};
use crate::index::types::DocumentFields;
use crate::index::writer::{WriterGuard, WriterSession};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tantivy::schema::Schema;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, Searcher};

/// File whose presence means an index has been committed at least once
const META_FILE: &str = "meta.json";

/// Default memory budget for the writer
pub const DEFAULT_WRITER_HEAP_BYTES: usize = 50_000_000;

/// Smallest budget the engine accepts for a writer
pub const MIN_WRITER_HEAP_BYTES: usize = 15_000_000;

/// How [`IndexStore::open_or_create`] obtained the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// An existing index was opened
    Opened,
    /// A fresh, empty index was created and still needs populating
    Created,
}

pub struct IndexStore {
    index: Index,
    reader: IndexReader,
    fields: DocumentFields,
    location: PathBuf,
    writer_heap_bytes: usize,
    writer_active: Arc<AtomicBool>,
}

impl IndexStore {
    /// Whether a committed index exists at `location`
    pub fn exists(location: &Path) -> bool {
        location.join(META_FILE).is_file()
    }

    /// Create a new, empty index. Fails if one already exists there.
    pub fn create(location: &Path) -> Result<Self> {
        fs::create_dir_all(location)?;
        let (schema, fields) = DocumentFields::schema();
        let index = Index::create_in_dir(location, schema)
            .map_err(|e| unusable(location, e.to_string()))?;
        log::info!("created index at {}", location.display());
        Self::from_index(index, fields, location)
    }

    /// Open an existing index, checking its schema
    pub fn open(location: &Path) -> Result<Self> {
        if !Self::exists(location) {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no index at {}", location.display()),
            )));
        }

        let index = Index::open_in_dir(location).map_err(|e| unusable(location, e.to_string()))?;
        let (expected, fields) = DocumentFields::schema();
        if !same_schema(&index.schema(), &expected) {
            return Err(Error::SchemaMismatch {
                path: location.to_path_buf(),
            });
        }

        Self::from_index(index, fields, location)
    }

    /// Open the index if it exists, otherwise create it
    pub fn open_or_create(location: &Path) -> Result<(Self, OpenMode)> {
        if Self::exists(location) {
            Ok((Self::open(location)?, OpenMode::Opened))
        } else {
            Ok((Self::create(location)?, OpenMode::Created))
        }
    }

    /// Delete the on-disk index
    pub fn remove(location: &Path) -> Result<()> {
        if location.exists() {
            fs::remove_dir_all(location)?;
        }
        Ok(())
    }

    fn from_index(index: Index, fields: DocumentFields, location: &Path) -> Result<Self> {
        let reader: IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(Self {
            index,
            reader,
            fields,
            location: location.to_path_buf(),
            writer_heap_bytes: DEFAULT_WRITER_HEAP_BYTES,
            writer_active: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Override the writer memory budget
    pub fn with_writer_heap(mut self, bytes: usize) -> Self {
        self.writer_heap_bytes = bytes;
        self
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn fields(&self) -> DocumentFields {
        self.fields
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Pick up commits made by other writers
    pub fn refresh(&self) -> Result<()> {
        self.reader.reload()?;
        Ok(())
    }

    /// Snapshot of the last committed state
    pub fn searcher(&self) -> Searcher {
        self.reader.searcher()
    }

    /// Open the single writer session.
    ///
    /// Fails with [`Error::Lock`] while another session is active, whether
    /// it belongs to this process or to another one.
    pub fn writer(&self) -> Result<WriterSession> {
        if self.writer_active.swap(true, Ordering::AcqRel) {
            return Err(Error::Lock);
        }
        let guard = WriterGuard::new(Arc::clone(&self.writer_active));

        let writer: IndexWriter = self.index.writer(self.writer_heap_bytes)?;
        self.reader.reload()?;

        Ok(WriterSession::new(
            writer,
            self.reader.clone(),
            self.fields,
            guard,
        ))
    }
}

/// Map an open/create failure to an I/O error naming the location
fn unusable(location: &Path, message: String) -> Error {
    Error::Io(io::Error::other(format!(
        "index at {} is unusable: {}",
        location.display(),
        message
    )))
}

fn same_schema(found: &Schema, expected: &Schema) -> bool {
    match (serde_json::to_value(found), serde_json::to_value(expected)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tantivy::schema::{STORED, TEXT};

    #[test]
    fn test_create_then_open() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("index");

        assert!(!IndexStore::exists(&location));
        let store = IndexStore::create(&location).unwrap();
        assert_eq!(store.searcher().num_docs(), 0);
        drop(store);

        assert!(IndexStore::exists(&location));
        let store = IndexStore::open(&location).unwrap();
        assert_eq!(store.location(), location.as_path());
    }

    #[test]
    fn test_open_or_create_modes() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("index");

        let (_, mode) = IndexStore::open_or_create(&location).unwrap();
        assert_eq!(mode, OpenMode::Created);

        let (_, mode) = IndexStore::open_or_create(&location).unwrap();
        assert_eq!(mode, OpenMode::Opened);
    }

    #[test]
    fn test_open_missing_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = IndexStore::open(&dir.path().join("nope")).err().unwrap();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_open_detects_schema_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("index");
        fs::create_dir_all(&location).unwrap();

        let mut builder = Schema::builder();
        builder.add_text_field("path", TEXT | STORED);
        builder.add_text_field("body", TEXT);
        Index::create_in_dir(&location, builder.build()).unwrap();

        let err = IndexStore::open(&location).err().unwrap();
        assert!(matches!(err, Error::SchemaMismatch { .. }));
    }

    #[test]
    fn test_open_corrupted_meta_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("index");
        fs::create_dir_all(&location).unwrap();
        fs::write(location.join(META_FILE), "garbage").unwrap();

        let err = IndexStore::open(&location).err().unwrap();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_second_writer_is_locked() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::create(&dir.path().join("index")).unwrap();

        let first = store.writer().unwrap();
        assert!(matches!(store.writer(), Err(Error::Lock)));

        drop(first);
        assert!(store.writer().is_ok());
    }

    #[test]
    fn test_writer_locked_across_store_handles() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("index");
        let store_a = IndexStore::create(&location).unwrap();
        let store_b = IndexStore::open(&location).unwrap();

        let _session = store_a.writer().unwrap();
        assert!(matches!(store_b.writer(), Err(Error::Lock)));
    }

    #[test]
    fn test_remove_deletes_directory() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("index");
        IndexStore::create(&location).unwrap();

        IndexStore::remove(&location).unwrap();
        assert!(!location.exists());
    }
}
