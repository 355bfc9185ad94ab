//! Read access to one on-disk segment.

use std::collections::BTreeMap;

use log::debug;

use crate::codec::PostingCodec;
use crate::document::Document;
use crate::error::{PagedexError, Result};
use crate::segment::format::{
    DictionarySlot, HEADER_SIZE, POINTER_SIZE, PositionPointer, PostingData, PostingEntry,
    SegmentFile, SegmentFiles,
};
use crate::storage::document::{DocumentStore, FileDocumentStore, require_document};
use crate::storage::page::{PageCursor, PageReader, PageStore};

/// An open, immutable segment.
#[derive(Debug)]
pub struct SegmentReader {
    files: SegmentFiles,
    codec: PostingCodec,
    dictionary: PageStore,
    postings: PageStore,
    positions: Option<(PageStore, PageStore)>,
    documents: FileDocumentStore,
    count_cursor: PageCursor,
    term_count: u32,
}

impl SegmentReader {
    /// Open every file of a segment written with the given page size.
    pub fn open(files: &SegmentFiles, page_size: usize, positional: bool) -> Result<Self> {
        let dictionary = PageStore::open(files.path(SegmentFile::Dictionary), page_size)?;
        let postings = PageStore::open(files.path(SegmentFile::Posting), page_size)?;
        let positions = if positional {
            Some((
                PageStore::open(files.path(SegmentFile::Position), page_size)?,
                PageStore::open(files.path(SegmentFile::PositionMeta), page_size)?,
            ))
        } else {
            None
        };
        let documents = FileDocumentStore::open_read_only(files.path(SegmentFile::Documents))?;

        let mut reader = PageReader::new(&dictionary);
        let mut cursor = PageCursor::default();
        let count_cursor = PageCursor::new(
            reader.read_u32(&mut cursor)?,
            reader.read_u32(&mut cursor)?,
        );
        if count_cursor.absolute(page_size) < HEADER_SIZE {
            return Err(PagedexError::segment(format!(
                "segment {} has a corrupt dictionary header",
                files.name()
            )));
        }
        let mut at = count_cursor;
        let term_count = reader.read_u32(&mut at)?;

        debug!(
            "Opened segment {}: {} terms, {} documents",
            files.name(),
            term_count,
            documents.size()
        );

        Ok(SegmentReader {
            files: files.clone(),
            codec: PostingCodec::for_index(positional),
            dictionary,
            postings,
            positions,
            documents,
            count_cursor,
            term_count,
        })
    }

    /// Files backing this segment.
    pub fn files(&self) -> &SegmentFiles {
        &self.files
    }

    /// Whether the segment carries positions.
    pub fn is_positional(&self) -> bool {
        self.positions.is_some()
    }

    /// Number of distinct terms.
    pub fn term_count(&self) -> u32 {
        self.term_count
    }

    /// Number of stored documents.
    pub fn num_documents(&self) -> u32 {
        self.documents.size() as u32
    }

    /// Walk the dictionary in term order.
    pub fn walker(&self) -> DictionaryWalker<'_> {
        let page_size = self.dictionary.page_size();
        DictionaryWalker {
            blob: PageReader::new(&self.dictionary),
            slots: PageReader::new(&self.dictionary),
            blob_cursor: PageCursor::from_absolute(HEADER_SIZE, page_size),
            slot_cursor: self.count_cursor.advance(4, page_size),
            remaining: self.term_count,
        }
    }

    /// Find the slot of `term`.
    pub fn lookup(&self, term: &str) -> Result<Option<DictionarySlot>> {
        let mut walker = self.walker();
        while walker.has_next_term() {
            let (candidate, slot) = walker.read_term_and_slot()?;
            match candidate.as_str().cmp(term) {
                std::cmp::Ordering::Less => continue,
                std::cmp::Ordering::Equal => return Ok(Some(slot)),
                std::cmp::Ordering::Greater => break,
            }
        }
        Ok(None)
    }

    /// Slots of every term in `terms` that the dictionary contains.
    ///
    /// One pass over the dictionary regardless of how many terms are asked for.
    pub fn lookup_all<'t, I>(&self, terms: I) -> Result<BTreeMap<String, DictionarySlot>>
    where
        I: IntoIterator<Item = &'t str>,
    {
        let wanted: std::collections::BTreeSet<&str> = terms.into_iter().collect();
        let mut found = BTreeMap::new();
        let Some(last) = wanted.last().copied() else {
            return Ok(found);
        };

        let mut walker = self.walker();
        while walker.has_next_term() {
            let (term, slot) = walker.read_term_and_slot()?;
            if wanted.contains(term.as_str()) {
                found.insert(term.clone(), slot);
            }
            if term.as_str() >= last {
                break;
            }
        }
        Ok(found)
    }

    /// Every term with its slot.
    pub fn load_dictionary(&self) -> Result<BTreeMap<String, DictionarySlot>> {
        let mut dictionary = BTreeMap::new();
        let mut walker = self.walker();
        while walker.has_next_term() {
            let (term, slot) = walker.read_term_and_slot()?;
            dictionary.insert(term, slot);
        }
        Ok(dictionary)
    }

    /// Decode the doc-id list of a term.
    pub fn read_doc_ids(&self, slot: &DictionarySlot) -> Result<Vec<u32>> {
        let mut reader = PageReader::new(&self.postings);
        let mut cursor = slot.postings.cursor();
        self.read_ids_at(&mut reader, &mut cursor, slot)
    }

    fn read_ids_at(
        &self,
        reader: &mut PageReader<'_>,
        cursor: &mut PageCursor,
        slot: &DictionarySlot,
    ) -> Result<Vec<u32>> {
        let bytes = reader.read_bytes(cursor, slot.postings.len as usize)?;
        let ids = self.codec.decode(&bytes)?;
        if ids.len() != slot.doc_count as usize {
            return Err(PagedexError::segment(format!(
                "segment {}: posting list holds {} ids, dictionary says {}",
                self.files.name(),
                ids.len(),
                slot.doc_count
            )));
        }
        Ok(ids)
    }

    /// Decode the postings of a term with their frequencies and, in a
    /// positional segment, their position pointers.
    pub fn read_posting_list(&self, slot: &DictionarySlot) -> Result<Vec<PostingEntry>> {
        let mut reader = PageReader::new(&self.postings);
        let mut cursor = slot.postings.cursor();
        let ids = self.read_ids_at(&mut reader, &mut cursor, slot)?;

        let mut frequencies = Vec::with_capacity(ids.len());
        for _ in 0..ids.len() {
            frequencies.push(reader.read_u32(&mut cursor)?);
        }

        let pointers = match &self.positions {
            Some((_, meta)) => {
                let mut reader = PageReader::new(meta);
                let mut cursor = PageCursor::from_absolute(
                    slot.meta_start as u64 * POINTER_SIZE,
                    meta.page_size(),
                );
                let mut pointers = Vec::with_capacity(ids.len());
                for _ in 0..ids.len() {
                    pointers.push(Some(PositionPointer::read_from(&mut reader, &mut cursor)?));
                }
                pointers
            }
            None => vec![None; ids.len()],
        };

        Ok(ids
            .into_iter()
            .zip(frequencies)
            .zip(pointers)
            .map(|((doc_id, frequency), positions)| PostingEntry {
                doc_id,
                frequency,
                positions,
            })
            .collect())
    }

    /// Decode one document's position list.
    pub fn read_position_list(&self, pointer: &PositionPointer) -> Result<Vec<u32>> {
        let Some((positions, _)) = &self.positions else {
            return Err(PagedexError::unsupported(format!(
                "segment {} has no positions",
                self.files.name()
            )));
        };
        let mut reader = PageReader::new(positions);
        let mut cursor = pointer.cursor();
        let bytes = reader.read_bytes(&mut cursor, pointer.len as usize)?;
        PostingCodec::DeltaVarLen.decode(&bytes)
    }

    /// Positions of every posting of a term, keyed by document.
    pub fn read_positions(&self, slot: &DictionarySlot) -> Result<BTreeMap<u32, Vec<u32>>> {
        let mut positions = BTreeMap::new();
        for entry in self.read_posting_list(slot)? {
            let pointer = entry.positions.ok_or_else(|| {
                PagedexError::unsupported(format!(
                    "segment {} has no positions",
                    self.files.name()
                ))
            })?;
            positions.insert(entry.doc_id, self.read_position_list(&pointer)?);
        }
        Ok(positions)
    }

    /// Postings of a term fully materialized, ready to be written again.
    pub fn read_postings_full(&self, slot: &DictionarySlot) -> Result<Vec<PostingData>> {
        self.read_posting_list(slot)?
            .into_iter()
            .map(|entry| {
                let positions = match &entry.positions {
                    Some(pointer) => self.read_position_list(pointer)?,
                    None => Vec::new(),
                };
                Ok(PostingData {
                    doc_id: entry.doc_id,
                    frequency: entry.frequency,
                    positions,
                })
            })
            .collect()
    }

    /// Fetch a stored document.
    pub fn document(&self, id: u32) -> Result<Document> {
        require_document(&self.documents, id)
    }

    /// The segment's document store.
    pub fn documents(&self) -> &dyn DocumentStore {
        &self.documents
    }
}

/// Sequential cursor over a segment dictionary.
///
/// Term bytes and slots live in two regions of the same file, so the walker
/// keeps one page reader for each.
#[derive(Debug)]
pub struct DictionaryWalker<'a> {
    blob: PageReader<'a>,
    slots: PageReader<'a>,
    blob_cursor: PageCursor,
    slot_cursor: PageCursor,
    remaining: u32,
}

impl DictionaryWalker<'_> {
    /// Whether another term follows.
    pub fn has_next_term(&self) -> bool {
        self.remaining > 0
    }

    /// Read the next term and its slot.
    pub fn read_term_and_slot(&mut self) -> Result<(String, DictionarySlot)> {
        if self.remaining == 0 {
            return Err(PagedexError::precondition("dictionary is exhausted"));
        }
        let slot = DictionarySlot::read_from(&mut self.slots, &mut self.slot_cursor)?;
        let bytes = self
            .blob
            .read_bytes(&mut self.blob_cursor, slot.term_len as usize)?;
        let term = String::from_utf8(bytes)
            .map_err(|e| PagedexError::segment(format!("term is not valid UTF-8: {e}")))?;
        self.remaining -= 1;
        Ok((term, slot))
    }

    /// Read the next entry, or `None` at the end.
    pub fn next_entry(&mut self) -> Result<Option<(String, DictionarySlot)>> {
        if self.has_next_term() {
            self.read_term_and_slot().map(Some)
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::writer::SegmentWriter;
    use tempfile::TempDir;

    fn write_sample(dir: &std::path::Path, page_size: usize, positional: bool) -> SegmentFiles {
        let files = SegmentFiles::committed(dir, 0);
        let mut writer = SegmentWriter::create(
            files.clone(),
            page_size,
            PostingCodec::for_index(positional),
            positional,
        )
        .unwrap();

        // doc0: "cat dog cat", doc1: "cat bird"
        let postings = |list: &[(u32, &[u32])]| -> Vec<PostingData> {
            list.iter()
                .map(|(id, pos)| PostingData::with_positions(*id, pos.to_vec()))
                .collect()
        };
        writer.add_term("bird", &postings(&[(1, &[1])])).unwrap();
        writer
            .add_term("cat", &postings(&[(0, &[0, 2]), (1, &[0])]))
            .unwrap();
        writer.add_term("dog", &postings(&[(0, &[1])])).unwrap();
        writer.add_document(0, Document::new("cat dog cat")).unwrap();
        writer.add_document(1, Document::new("cat bird")).unwrap();
        writer.finish().unwrap();
        files
    }

    #[test]
    fn test_walk_dictionary() {
        let temp_dir = TempDir::new().unwrap();
        let files = write_sample(temp_dir.path(), 4096, false);
        let reader = SegmentReader::open(&files, 4096, false).unwrap();

        let mut walker = reader.walker();
        let mut terms = Vec::new();
        while walker.has_next_term() {
            terms.push(walker.read_term_and_slot().unwrap().0);
        }
        assert_eq!(terms, vec!["bird", "cat", "dog"]);
        assert!(walker.read_term_and_slot().is_err());
    }

    #[test]
    fn test_posting_list_and_frequencies() {
        let temp_dir = TempDir::new().unwrap();
        let files = write_sample(temp_dir.path(), 4096, false);
        let reader = SegmentReader::open(&files, 4096, false).unwrap();

        let slot = reader.lookup("cat").unwrap().unwrap();
        assert_eq!(slot.doc_count, 2);
        assert_eq!(slot.meta_start, 0);

        let entries = reader.read_posting_list(&slot).unwrap();
        assert_eq!(
            entries,
            vec![
                PostingEntry {
                    doc_id: 0,
                    frequency: 2,
                    positions: None
                },
                PostingEntry {
                    doc_id: 1,
                    frequency: 1,
                    positions: None
                },
            ]
        );
        assert!(reader.lookup("cow").unwrap().is_none());
        assert!(reader.lookup("zebra").unwrap().is_none());
        assert!(
            reader
                .read_position_list(&PositionPointer::default())
                .unwrap_err()
                .is_unsupported()
        );
    }

    #[test]
    fn test_positions_with_tiny_pages() {
        let temp_dir = TempDir::new().unwrap();
        let files = write_sample(temp_dir.path(), 64, true);
        let reader = SegmentReader::open(&files, 64, true).unwrap();

        let dictionary = reader.load_dictionary().unwrap();
        assert_eq!(dictionary["bird"].meta_start, 0);
        assert_eq!(dictionary["cat"].meta_start, 1);
        assert_eq!(dictionary["dog"].meta_start, 3);

        let positions = reader.read_positions(&dictionary["cat"]).unwrap();
        assert_eq!(positions[&0], vec![0, 2]);
        assert_eq!(positions[&1], vec![0]);

        let full = reader.read_postings_full(&dictionary["dog"]).unwrap();
        assert_eq!(full, vec![PostingData::with_positions(0, vec![1])]);
        assert_eq!(reader.document(1).unwrap().text(), "cat bird");
    }

    #[test]
    fn test_lookup_all() {
        let temp_dir = TempDir::new().unwrap();
        let files = write_sample(temp_dir.path(), 4096, false);
        let reader = SegmentReader::open(&files, 4096, false).unwrap();

        let found = reader.lookup_all(["dog", "fish", "bird"]).unwrap();
        assert_eq!(found.keys().collect::<Vec<_>>(), vec!["bird", "dog"]);
        assert!(reader.lookup_all(Vec::<&str>::new()).unwrap().is_empty());
    }
}
