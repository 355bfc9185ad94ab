//! Per-segment raw document storage.
//!
//! Every segment has a companion [`DocumentStore`] mapping local document ids
//! to the raw documents. [`FileDocumentStore`] keeps the map in memory and
//! persists it as one bincode image followed by a CRC32 of that image.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ByteOrder};

use crate::document::Document;
use crate::error::{PagedexError, Result};

/// Key-value storage of raw documents for one segment.
pub trait DocumentStore: Debug {
    /// Store `document` under `id`, replacing any previous value.
    fn put(&mut self, id: u32, document: Document) -> Result<()>;

    /// Fetch the document stored under `id`.
    fn get(&self, id: u32) -> Result<Option<Document>>;

    /// Number of stored documents.
    fn size(&self) -> usize;

    /// All documents in ascending id order.
    fn iter(&self) -> Box<dyn Iterator<Item = (u32, &Document)> + '_>;

    /// Persist pending changes and release the store.
    fn close(&mut self) -> Result<()>;
}

/// A document store backed by a single file.
#[derive(Debug)]
pub struct FileDocumentStore {
    path: PathBuf,
    documents: BTreeMap<u32, Document>,
    read_only: bool,
    dirty: bool,
}

impl FileDocumentStore {
    /// Create an empty store that will be written to `path` on close.
    pub fn create<P: AsRef<Path>>(path: P) -> Self {
        FileDocumentStore {
            path: path.as_ref().to_path_buf(),
            documents: BTreeMap::new(),
            read_only: false,
            dirty: true,
        }
    }

    /// Open an existing store for lookups only.
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = fs::read(&path).map_err(|e| {
            PagedexError::storage(format!(
                "Failed to read document store {}: {e}",
                path.display()
            ))
        })?;

        if data.len() < 4 {
            return Err(PagedexError::storage(format!(
                "document store {} is truncated",
                path.display()
            )));
        }

        let (image, footer) = data.split_at(data.len() - 4);
        let expected = BigEndian::read_u32(footer);
        let actual = crc32fast::hash(image);
        if expected != actual {
            return Err(PagedexError::storage(format!(
                "checksum mismatch in {}: expected {expected:08x}, found {actual:08x}",
                path.display()
            )));
        }

        let documents: BTreeMap<u32, Document> = bincode::deserialize(image)?;

        Ok(FileDocumentStore {
            path,
            documents,
            read_only: true,
            dirty: false,
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the current contents, replacing the file atomically.
    pub fn persist(&mut self) -> Result<()> {
        if self.read_only {
            return Err(PagedexError::precondition(format!(
                "document store {} is read-only",
                self.path.display()
            )));
        }

        let mut data = bincode::serialize(&self.documents)?;
        let checksum = crc32fast::hash(&data);
        let mut footer = [0u8; 4];
        BigEndian::write_u32(&mut footer, checksum);
        data.extend_from_slice(&footer);

        let partial = PathBuf::from(format!("{}.partial", self.path.display()));
        fs::write(&partial, &data)?;
        fs::rename(&partial, &self.path).map_err(|e| {
            PagedexError::storage(format!(
                "Failed to move {} into place: {e}",
                partial.display()
            ))
        })?;

        self.dirty = false;
        Ok(())
    }
}

impl DocumentStore for FileDocumentStore {
    fn put(&mut self, id: u32, document: Document) -> Result<()> {
        if self.read_only {
            return Err(PagedexError::precondition(format!(
                "document store {} is read-only",
                self.path.display()
            )));
        }
        self.documents.insert(id, document);
        self.dirty = true;
        Ok(())
    }

    fn get(&self, id: u32) -> Result<Option<Document>> {
        Ok(self.documents.get(&id).cloned())
    }

    fn size(&self) -> usize {
        self.documents.len()
    }

    fn iter(&self) -> Box<dyn Iterator<Item = (u32, &Document)> + '_> {
        Box::new(self.documents.iter().map(|(id, doc)| (*id, doc)))
    }

    fn close(&mut self) -> Result<()> {
        if self.dirty && !self.read_only {
            self.persist()?;
        }
        Ok(())
    }
}

/// Fetch a document that the segment's postings say must exist.
pub fn require_document(store: &dyn DocumentStore, id: u32) -> Result<Document> {
    store.get(id)?.ok_or_else(|| {
        PagedexError::storage(format!("document {id} missing from document store"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_put_close_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("docstore_0");

        let mut store = FileDocumentStore::create(&path);
        store.put(0, Document::new("cat dog")).unwrap();
        store.put(1, Document::new("cat bird")).unwrap();
        store.close().unwrap();

        let store = FileDocumentStore::open_read_only(&path).unwrap();
        assert_eq!(store.size(), 2);
        assert_eq!(store.get(1).unwrap(), Some(Document::new("cat bird")));
        assert_eq!(store.get(2).unwrap(), None);

        let ids: Vec<u32> = store.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn test_empty_store_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("docstore_0");

        let mut store = FileDocumentStore::create(&path);
        store.close().unwrap();

        let store = FileDocumentStore::open_read_only(&path).unwrap();
        assert_eq!(store.size(), 0);
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("docstore_0");
        FileDocumentStore::create(&path).close().unwrap();

        let mut store = FileDocumentStore::open_read_only(&path).unwrap();
        assert!(store.put(0, Document::new("x")).is_err());
    }

    #[test]
    fn test_corruption_detected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("docstore_0");

        let mut store = FileDocumentStore::create(&path);
        store.put(0, Document::new("hello")).unwrap();
        store.close().unwrap();

        let mut data = fs::read(&path).unwrap();
        let last = data.len() - 5;
        data[last] ^= 0xFF;
        fs::write(&path, data).unwrap();

        assert!(FileDocumentStore::open_read_only(&path).is_err());
    }

    #[test]
    fn test_require_document() {
        let mut store = FileDocumentStore::create("unused");
        store.put(3, Document::new("three")).unwrap();
        assert_eq!(require_document(&store, 3).unwrap().text(), "three");
        assert!(require_document(&store, 4).is_err());
    }
}
