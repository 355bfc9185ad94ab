//! Fixed-size page files.
//!
//! A [`PageStore`] is a file made of whole pages of one size. Pages are only
//! ever transferred as complete units; byte ranges that straddle pages are
//! handled by [`PageReader`] and [`PageWriter`], which thread an explicit
//! [`PageCursor`] through their primitives.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ByteOrder};

use crate::error::{PagedexError, Result};

/// Default page size in bytes.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Smallest page size an index accepts.
pub const MIN_PAGE_SIZE: usize = 64;

/// Position of a byte inside a page file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct PageCursor {
    /// Page number.
    pub page: u32,
    /// Byte offset inside the page.
    pub offset: u32,
}

impl PageCursor {
    /// Create a cursor at `offset` inside `page`.
    pub fn new(page: u32, offset: u32) -> Self {
        PageCursor { page, offset }
    }

    /// Convert an absolute byte position into a cursor.
    pub fn from_absolute(position: u64, page_size: usize) -> Self {
        let page_size = page_size as u64;
        PageCursor {
            page: (position / page_size) as u32,
            offset: (position % page_size) as u32,
        }
    }

    /// Absolute byte position of this cursor.
    pub fn absolute(&self, page_size: usize) -> u64 {
        self.page as u64 * page_size as u64 + self.offset as u64
    }

    /// Cursor `len` bytes further on.
    pub fn advance(&self, len: u64, page_size: usize) -> Self {
        PageCursor::from_absolute(self.absolute(page_size) + len, page_size)
    }

    // An offset equal to the page size means "start of the next page".
    fn normalize(&mut self, page_size: usize) {
        if self.offset as usize >= page_size {
            *self = self.advance(0, page_size);
        }
    }
}

/// An append-only file of fixed-size pages.
#[derive(Debug)]
pub struct PageStore {
    file: File,
    path: PathBuf,
    page_size: usize,
    page_count: u32,
}

impl PageStore {
    /// Create (or truncate) a page file for writing.
    pub fn create<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        Ok(PageStore {
            file,
            path,
            page_size,
            page_count: 0,
        })
    }

    /// Open an existing page file for reading.
    pub fn open<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| {
            PagedexError::storage(format!("Failed to open {}: {e}", path.display()))
        })?;

        let len = file.metadata()?.len();
        if len % page_size as u64 != 0 {
            return Err(PagedexError::storage(format!(
                "{} is {len} bytes, not a multiple of the page size {page_size}",
                path.display()
            )));
        }

        Ok(PageStore {
            file,
            path,
            page_size,
            page_count: (len / page_size as u64) as u32,
        })
    }

    /// Page size of this store.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of pages in the file.
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one page. Shorter buffers are zero-padded.
    ///
    /// Returns the number of the page just written.
    pub fn append_page(&mut self, data: &[u8]) -> Result<u32> {
        if data.len() > self.page_size {
            return Err(PagedexError::precondition(format!(
                "page buffer of {} bytes exceeds page size {}",
                data.len(),
                self.page_size
            )));
        }

        let page = self.page_count;
        self.file
            .seek(SeekFrom::Start(page as u64 * self.page_size as u64))?;
        self.file.write_all(data)?;
        if data.len() < self.page_size {
            self.file.write_all(&vec![0u8; self.page_size - data.len()])?;
        }

        self.page_count += 1;
        Ok(page)
    }

    /// Read the n-th page.
    pub fn read_page(&self, page: u32) -> Result<Vec<u8>> {
        if page >= self.page_count {
            return Err(PagedexError::storage(format!(
                "page {page} out of range for {} ({} pages)",
                self.path.display(),
                self.page_count
            )));
        }

        let mut buffer = vec![0u8; self.page_size];
        let mut file = &self.file;
        file.seek(SeekFrom::Start(page as u64 * self.page_size as u64))?;
        file.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    /// Overwrite one existing page.
    fn write_page(&mut self, page: u32, data: &[u8]) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(page as u64 * self.page_size as u64))?;
        self.file.write_all(data)?;
        Ok(())
    }

    /// Read `len` bytes starting at `cursor`, crossing pages as needed.
    pub fn read_span(&self, cursor: PageCursor, len: usize) -> Result<Vec<u8>> {
        let mut cursor = cursor;
        PageReader::new(self).read_bytes(&mut cursor, len)
    }

    /// Write `data` starting at `cursor`.
    ///
    /// Existing pages are patched in place; a span running past the last
    /// page allocates fresh zeroed pages. A span may not start beyond the
    /// current end of the file.
    pub fn write_span(&mut self, cursor: PageCursor, data: &[u8]) -> Result<()> {
        let mut cursor = cursor;
        cursor.normalize(self.page_size);
        if cursor.page > self.page_count {
            return Err(PagedexError::precondition(format!(
                "span starts on page {} past the end of {} ({} pages)",
                cursor.page,
                self.path.display(),
                self.page_count
            )));
        }

        let mut written = 0;
        while written < data.len() {
            cursor.normalize(self.page_size);
            let mut page = if cursor.page < self.page_count {
                self.read_page(cursor.page)?
            } else {
                vec![0u8; self.page_size]
            };

            let start = cursor.offset as usize;
            let n = (self.page_size - start).min(data.len() - written);
            page[start..start + n].copy_from_slice(&data[written..written + n]);

            if cursor.page < self.page_count {
                self.write_page(cursor.page, &page)?;
            } else {
                self.append_page(&page)?;
            }

            written += n;
            cursor.offset += n as u32;
        }

        Ok(())
    }

    /// Flush file contents to disk.
    pub fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }
}

/// Reads arbitrary byte ranges from a [`PageStore`], keeping the most
/// recently loaded page in memory.
#[derive(Debug)]
pub struct PageReader<'a> {
    store: &'a PageStore,
    current: Option<(u32, Vec<u8>)>,
}

impl<'a> PageReader<'a> {
    /// Create a reader over `store`.
    pub fn new(store: &'a PageStore) -> Self {
        PageReader {
            store,
            current: None,
        }
    }

    fn load(&mut self, page: u32) -> Result<&[u8]> {
        let cached = matches!(&self.current, Some((loaded, _)) if *loaded == page);
        if !cached {
            let data = self.store.read_page(page)?;
            self.current = Some((page, data));
        }

        match &self.current {
            Some((_, data)) => Ok(data),
            None => Err(PagedexError::storage("page cache is empty")),
        }
    }

    /// Fill `out` from `cursor`, advancing the cursor past the bytes read.
    pub fn read_into(&mut self, cursor: &mut PageCursor, out: &mut [u8]) -> Result<()> {
        let page_size = self.store.page_size();
        let mut filled = 0;

        while filled < out.len() {
            cursor.normalize(page_size);
            let page = self.load(cursor.page)?;

            let start = cursor.offset as usize;
            let n = (page_size - start).min(out.len() - filled);
            out[filled..filled + n].copy_from_slice(&page[start..start + n]);

            filled += n;
            cursor.offset += n as u32;
        }

        Ok(())
    }

    /// Read `len` bytes from `cursor`.
    pub fn read_bytes(&mut self, cursor: &mut PageCursor, len: usize) -> Result<Vec<u8>> {
        let mut out = vec![0u8; len];
        self.read_into(cursor, &mut out)?;
        Ok(out)
    }

    /// Read a u8 value.
    pub fn read_u8(&mut self, cursor: &mut PageCursor) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_into(cursor, &mut buf)?;
        Ok(buf[0])
    }

    /// Read a u16 value (big-endian).
    pub fn read_u16(&mut self, cursor: &mut PageCursor) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.read_into(cursor, &mut buf)?;
        Ok(BigEndian::read_u16(&buf))
    }

    /// Read a u32 value (big-endian).
    pub fn read_u32(&mut self, cursor: &mut PageCursor) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_into(cursor, &mut buf)?;
        Ok(BigEndian::read_u32(&buf))
    }
}

/// Streams bytes into a [`PageStore`], appending each page once it is full.
#[derive(Debug)]
pub struct PageWriter {
    store: PageStore,
    page: Vec<u8>,
    cursor: PageCursor,
}

impl PageWriter {
    /// Start writing after the last page of `store`.
    pub fn new(store: PageStore) -> Self {
        let page = vec![0u8; store.page_size()];
        let cursor = PageCursor::new(store.page_count(), 0);
        PageWriter {
            store,
            page,
            cursor,
        }
    }

    /// Create a fresh page file at `path` and write into it.
    pub fn create<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self> {
        Ok(PageWriter::new(PageStore::create(path, page_size)?))
    }

    /// Location the next byte will be written to.
    pub fn cursor(&self) -> PageCursor {
        self.cursor
    }

    /// Write raw bytes, splitting them across pages.
    pub fn write_bytes(&mut self, mut data: &[u8]) -> Result<()> {
        let page_size = self.store.page_size();

        while !data.is_empty() {
            let start = self.cursor.offset as usize;
            let n = (page_size - start).min(data.len());
            self.page[start..start + n].copy_from_slice(&data[..n]);
            self.cursor.offset += n as u32;
            data = &data[n..];

            if self.cursor.offset as usize == page_size {
                self.store.append_page(&self.page)?;
                self.page.fill(0);
                self.cursor = PageCursor::new(self.cursor.page + 1, 0);
            }
        }

        Ok(())
    }

    /// Write a u8 value.
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_bytes(&[value])
    }

    /// Write a u16 value (big-endian).
    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        let mut buf = [0u8; 2];
        BigEndian::write_u16(&mut buf, value);
        self.write_bytes(&buf)
    }

    /// Write a u32 value (big-endian).
    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        let mut buf = [0u8; 4];
        BigEndian::write_u32(&mut buf, value);
        self.write_bytes(&buf)
    }

    /// Append the trailing partial page, sync, and hand back the store.
    pub fn finish(mut self) -> Result<PageStore> {
        if self.cursor.offset > 0 {
            self.store.append_page(&self.page)?;
        }
        self.store.sync()?;
        Ok(self.store)
    }
}
