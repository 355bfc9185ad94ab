//! Writes one segment from an ascending stream of terms.
//!
//! The same writer serves flushes (terms from the in-memory buffer) and
//! merges (terms from two existing segments). Everything goes to the
//! staging names of a [`SegmentFiles`]; the caller renames the files into
//! place once [`SegmentWriter::finish`] returned.

use byteorder::{BigEndian, ByteOrder};
use log::debug;

use crate::codec::PostingCodec;
use crate::document::Document;
use crate::error::{PagedexError, Result};
use crate::segment::format::{
    DictionarySlot, HEADER_SIZE, PositionPointer, PostingData, SegmentFile, SegmentFiles,
};
use crate::storage::document::{DocumentStore, FileDocumentStore};
use crate::storage::page::{PageCursor, PageWriter};

/// Totals reported by a finished segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SegmentSummary {
    /// Number of distinct terms.
    pub terms: u32,
    /// Number of postings across all terms.
    pub postings: u32,
    /// Number of stored documents.
    pub documents: u32,
    /// Size of the keyword blob in bytes.
    pub term_bytes: u64,
}

/// Streams terms and documents into a new segment.
#[derive(Debug)]
pub struct SegmentWriter {
    files: SegmentFiles,
    codec: PostingCodec,
    dictionary: PageWriter,
    postings: PageWriter,
    positions: Option<(PageWriter, PageWriter)>,
    documents: FileDocumentStore,
    slots: Vec<DictionarySlot>,
    last_term: Option<String>,
    meta_count: u32,
    term_bytes: u64,
}

impl SegmentWriter {
    /// Create the staging files of `files`.
    pub fn create(
        files: SegmentFiles,
        page_size: usize,
        codec: PostingCodec,
        positional: bool,
    ) -> Result<Self> {
        let mut dictionary = PageWriter::create(files.path(SegmentFile::Dictionary), page_size)?;
        // Placeholder for (count_page, count_offset), patched in finish().
        dictionary.write_bytes(&[0u8; HEADER_SIZE as usize])?;

        let postings = PageWriter::create(files.path(SegmentFile::Posting), page_size)?;
        let positions = if positional {
            Some((
                PageWriter::create(files.path(SegmentFile::Position), page_size)?,
                PageWriter::create(files.path(SegmentFile::PositionMeta), page_size)?,
            ))
        } else {
            None
        };
        let documents = FileDocumentStore::create(files.path(SegmentFile::Documents));

        Ok(SegmentWriter {
            files,
            codec,
            dictionary,
            postings,
            positions,
            documents,
            slots: Vec::new(),
            last_term: None,
            meta_count: 0,
            term_bytes: 0,
        })
    }

    /// Whether position data is written.
    pub fn is_positional(&self) -> bool {
        self.positions.is_some()
    }

    /// Append one term with its postings.
    ///
    /// Terms must arrive in strictly ascending byte order and postings in
    /// strictly ascending document order. In a positional segment each
    /// posting's frequency must equal the number of its positions.
    pub fn add_term(&mut self, term: &str, postings: &[PostingData]) -> Result<()> {
        if let Some(last) = &self.last_term
            && last.as_str() >= term
        {
            return Err(PagedexError::precondition(format!(
                "term {term:?} does not sort after {last:?}"
            )));
        }
        if postings.is_empty() {
            return Err(PagedexError::precondition(format!(
                "term {term:?} has no postings"
            )));
        }
        if postings.windows(2).any(|w| w[0].doc_id >= w[1].doc_id) {
            return Err(PagedexError::precondition(format!(
                "postings of {term:?} are not strictly ascending"
            )));
        }

        self.dictionary.write_bytes(term.as_bytes())?;
        self.term_bytes += term.len() as u64;

        let doc_ids: Vec<u32> = postings.iter().map(|p| p.doc_id).collect();
        let encoded = self.codec.encode(&doc_ids)?;
        let start = self.postings.cursor();
        self.postings.write_bytes(&encoded)?;
        for posting in postings {
            self.postings.write_u32(posting.frequency)?;
        }

        let meta_start = match &mut self.positions {
            Some((positions, meta)) => {
                let meta_start = self.meta_count;
                for posting in postings {
                    if posting.positions.len() != posting.frequency as usize {
                        return Err(PagedexError::precondition(format!(
                            "posting of {term:?} in document {} has frequency {} but {} positions",
                            posting.doc_id,
                            posting.frequency,
                            posting.positions.len()
                        )));
                    }
                    let encoded = PostingCodec::DeltaVarLen.encode(&posting.positions)?;
                    let pointer = PositionPointer::new(positions.cursor(), encoded.len() as u32);
                    positions.write_bytes(&encoded)?;
                    pointer.write_to(meta)?;
                }
                self.meta_count += postings.len() as u32;
                meta_start
            }
            None => 0,
        };

        self.slots.push(DictionarySlot {
            term_len: term.len() as u32,
            postings: PositionPointer::new(start, encoded.len() as u32),
            doc_count: postings.len() as u32,
            meta_start,
        });
        self.last_term = Some(term.to_string());
        Ok(())
    }

    /// Store a raw document under its local id.
    pub fn add_document(&mut self, id: u32, document: Document) -> Result<()> {
        self.documents.put(id, document)
    }

    /// Write the slot array, patch the header, and close every file.
    pub fn finish(mut self) -> Result<SegmentSummary> {
        let count_cursor = self.dictionary.cursor();
        self.dictionary.write_u32(self.slots.len() as u32)?;
        for slot in &self.slots {
            slot.write_to(&mut self.dictionary)?;
        }

        let mut store = self.dictionary.finish()?;
        let mut header = [0u8; HEADER_SIZE as usize];
        BigEndian::write_u32(&mut header[0..4], count_cursor.page);
        BigEndian::write_u32(&mut header[4..8], count_cursor.offset);
        store.write_span(PageCursor::default(), &header)?;
        store.sync()?;

        self.postings.finish()?;
        if let Some((positions, meta)) = self.positions {
            positions.finish()?;
            meta.finish()?;
        }
        self.documents.close()?;

        let summary = SegmentSummary {
            terms: self.slots.len() as u32,
            postings: self.slots.iter().map(|s| s.doc_count).sum(),
            documents: self.documents.size() as u32,
            term_bytes: self.term_bytes,
        };
        debug!(
            "Wrote segment {}: {} terms, {} postings, {} documents",
            self.files.name(),
            summary.terms,
            summary.postings,
            summary.documents
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::reader::SegmentReader;
    use tempfile::TempDir;

    #[test]
    fn test_rejects_unsorted_terms() {
        let temp_dir = TempDir::new().unwrap();
        let files = SegmentFiles::staging(temp_dir.path(), "0");
        let mut writer =
            SegmentWriter::create(files, 64, PostingCodec::FixedWidth, false).unwrap();

        writer
            .add_term("dog", &[PostingData::with_frequency(0, 1)])
            .unwrap();
        assert!(writer
            .add_term("cat", &[PostingData::with_frequency(1, 1)])
            .is_err());
        assert!(writer
            .add_term("dog", &[PostingData::with_frequency(1, 1)])
            .is_err());
    }

    #[test]
    fn test_rejects_unsorted_postings() {
        let temp_dir = TempDir::new().unwrap();
        let files = SegmentFiles::staging(temp_dir.path(), "0");
        let mut writer =
            SegmentWriter::create(files, 64, PostingCodec::DeltaVarLen, true).unwrap();

        let postings = vec![
            PostingData::with_positions(2, vec![0]),
            PostingData::with_positions(1, vec![3]),
        ];
        assert!(writer.add_term("cat", &postings).is_err());
        assert!(writer
            .add_term("dog", &[PostingData::with_frequency(0, 2)])
            .is_err());
    }

    #[test]
    fn test_header_points_at_term_count() {
        let temp_dir = TempDir::new().unwrap();
        let files = SegmentFiles::staging(temp_dir.path(), "0");
        let mut writer =
            SegmentWriter::create(files.clone(), 64, PostingCodec::FixedWidth, false).unwrap();

        // 8 header bytes plus 70 blob bytes put the term count on page 1.
        let long_term = "x".repeat(70);
        writer
            .add_term(&long_term, &[PostingData::with_frequency(0, 1)])
            .unwrap();
        writer.add_document(0, Document::new(long_term.clone())).unwrap();
        let summary = writer.finish().unwrap();
        assert_eq!(summary.terms, 1);
        assert_eq!(summary.term_bytes, 70);

        let reader = SegmentReader::open(&files, 64, false).unwrap();
        assert_eq!(reader.term_count(), 1);
        let slot = reader.lookup(&long_term).unwrap().unwrap();
        assert_eq!(reader.read_doc_ids(&slot).unwrap(), vec![0]);
    }
}
