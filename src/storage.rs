//! Storage layer for pagedex.
//!
//! # Components
//!
//! - [`page::PageStore`]: append-only files of fixed-size pages, with
//!   [`page::PageReader`] / [`page::PageWriter`] for byte ranges that cross
//!   page boundaries.
//! - [`document::DocumentStore`]: per-segment raw document storage, with the
//!   file-backed [`document::FileDocumentStore`].
//!
//! # Example
//!
//! ```
//! use pagedex::storage::page::{PageCursor, PageWriter};
//!
//! # fn main() -> pagedex::error::Result<()> {
//! let dir = tempfile::TempDir::new()?;
//! let mut writer = PageWriter::create(dir.path().join("pages"), 64)?;
//! writer.write_bytes(&[1u8; 100])?;
//! let store = writer.finish()?;
//!
//! assert_eq!(store.page_count(), 2);
//! assert_eq!(store.read_span(PageCursor::new(0, 60), 8)?, vec![1u8; 8]);
//! # Ok(())
//! # }
//! ```

pub mod document;
pub mod page;

pub use document::{DocumentStore, FileDocumentStore};
pub use page::{DEFAULT_PAGE_SIZE, PageCursor, PageReader, PageStore, PageWriter};
