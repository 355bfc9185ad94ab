//! Whole-segment views for verification and tooling.

use std::collections::BTreeMap;

use crate::document::Document;
use crate::error::{PagedexError, Result};
use crate::index::manager::InvertedIndex;

/// Contents of one segment: term → doc ids, and the stored documents.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SegmentSnapshot {
    /// Every term with its ascending local doc ids.
    pub inverted_lists: BTreeMap<String, Vec<u32>>,
    /// Stored documents by local id.
    pub documents: BTreeMap<u32, Document>,
}

/// [`SegmentSnapshot`] plus the positions of every posting.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PositionalSegmentSnapshot {
    /// Every term with its ascending local doc ids.
    pub inverted_lists: BTreeMap<String, Vec<u32>>,
    /// Stored documents by local id.
    pub documents: BTreeMap<u32, Document>,
    /// `(term, doc id)` → positions.
    pub positions: BTreeMap<(String, u32), Vec<u32>>,
}

impl InvertedIndex {
    /// Number of documents stored in `segment`.
    pub fn num_documents(&self, segment: u32) -> Result<u32> {
        Ok(self.open_segment(segment)?.num_documents())
    }

    /// Number of documents of `segment` containing `token`.
    ///
    /// `token` is looked up as is, without analysis.
    pub fn document_frequency(&self, segment: u32, token: &str) -> Result<u32> {
        let reader = self.open_segment(segment)?;
        Ok(reader.lookup(token)?.map_or(0, |slot| slot.doc_count))
    }

    /// Read a whole segment into memory, or `None` if it does not exist.
    pub fn index_segment(&self, segment: u32) -> Result<Option<SegmentSnapshot>> {
        if segment >= self.num_segments() {
            return Ok(None);
        }
        let reader = self.open_segment(segment)?;

        let mut snapshot = SegmentSnapshot::default();
        for (term, slot) in reader.load_dictionary()? {
            snapshot
                .inverted_lists
                .insert(term, reader.read_doc_ids(&slot)?);
        }
        snapshot.documents = reader
            .documents()
            .iter()
            .map(|(id, doc)| (id, doc.clone()))
            .collect();
        Ok(Some(snapshot))
    }

    /// Like [`index_segment`](Self::index_segment) but with positions.
    ///
    /// Fails with [`PagedexError::UnsupportedOperation`] on a non-positional
    /// index.
    pub fn index_segment_positional(
        &self,
        segment: u32,
    ) -> Result<Option<PositionalSegmentSnapshot>> {
        if !self.is_positional() {
            return Err(PagedexError::unsupported(
                "positions are only stored by positional indexes",
            ));
        }
        if segment >= self.num_segments() {
            return Ok(None);
        }
        let reader = self.open_segment(segment)?;

        let mut snapshot = PositionalSegmentSnapshot::default();
        for (term, slot) in reader.load_dictionary()? {
            let positions = reader.read_positions(&slot)?;
            snapshot
                .inverted_lists
                .insert(term.clone(), positions.keys().copied().collect());
            for (doc_id, list) in positions {
                snapshot.positions.insert((term.clone(), doc_id), list);
            }
        }
        snapshot.documents = reader
            .documents()
            .iter()
            .map(|(id, doc)| (id, doc.clone()))
            .collect();
        Ok(Some(snapshot))
    }

    /// Every flushed document, in segment order and then local id order.
    pub fn documents(&self) -> Result<Vec<Document>> {
        let mut documents = Vec::new();
        for segment in 0..self.num_segments() {
            let reader = self.open_segment(segment)?;
            documents.extend(reader.documents().iter().map(|(_, doc)| doc.clone()));
        }
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::StandardAnalyzer;
    use crate::index::config::IndexConfig;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_positional_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let mut index = InvertedIndex::create_or_open(
            temp_dir.path(),
            Arc::new(StandardAnalyzer::new().unwrap()),
            IndexConfig::positional(),
        )
        .unwrap();
        index.add_document(Document::new("cat dog cat")).unwrap();
        index.add_document(Document::new("dog")).unwrap();
        index.flush().unwrap();

        let snapshot = index.index_segment_positional(0).unwrap().unwrap();
        assert_eq!(snapshot.inverted_lists["cat"], vec![0]);
        assert_eq!(snapshot.inverted_lists["dog"], vec![0, 1]);
        assert_eq!(snapshot.positions[&("cat".to_string(), 0)], vec![0, 2]);
        assert_eq!(snapshot.documents[&1].text(), "dog");
        assert!(index.index_segment_positional(1).unwrap().is_none());

        assert_eq!(index.num_documents(0).unwrap(), 2);
        assert_eq!(index.document_frequency(0, "dog").unwrap(), 2);
        assert_eq!(index.document_frequency(0, "Dog").unwrap(), 0);
    }

    #[test]
    fn test_non_positional_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let mut index = InvertedIndex::create_or_open(
            temp_dir.path(),
            Arc::new(StandardAnalyzer::new().unwrap()),
            IndexConfig::default(),
        )
        .unwrap();
        assert!(index.index_segment(0).unwrap().is_none());

        index.add_document(Document::new("hello world")).unwrap();
        index.flush().unwrap();

        let snapshot = index.index_segment(0).unwrap().unwrap();
        assert_eq!(snapshot.inverted_lists.len(), 2);
        assert!(index.index_segment_positional(0).unwrap_err().is_unsupported());
        assert_eq!(index.documents().unwrap(), vec![Document::new("hello world")]);
    }
}
