//! In-memory buffer of documents that have not been flushed yet.

use std::collections::BTreeMap;

use crate::document::Document;
use crate::segment::format::PostingData;

/// Term → (local document id → positions), plus the raw documents.
///
/// Local ids are assigned densely in insertion order, starting at 0 after
/// every flush.
#[derive(Debug, Default)]
pub struct IndexBuffer {
    terms: BTreeMap<String, BTreeMap<u32, Vec<u32>>>,
    documents: Vec<Document>,
    term_bytes: u64,
}

impl IndexBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an analyzed document and return its local id.
    pub fn add(&mut self, document: Document, terms: Vec<String>) -> u32 {
        let doc_id = self.documents.len() as u32;
        for (position, term) in terms.into_iter().enumerate() {
            if !self.terms.contains_key(&term) {
                self.term_bytes += term.len() as u64;
            }
            self.terms
                .entry(term)
                .or_default()
                .entry(doc_id)
                .or_default()
                .push(position as u32);
        }
        self.documents.push(document);
        doc_id
    }

    /// Number of buffered documents.
    pub fn doc_count(&self) -> usize {
        self.documents.len()
    }

    /// Number of distinct buffered terms.
    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    /// Sum of the byte lengths of all distinct terms.
    pub fn term_bytes(&self) -> u64 {
        self.term_bytes
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Terms in ascending order with their postings.
    pub fn postings(&self) -> impl Iterator<Item = (&str, Vec<PostingData>)> + '_ {
        self.terms.iter().map(|(term, docs)| {
            let postings = docs
                .iter()
                .map(|(doc_id, positions)| PostingData::with_positions(*doc_id, positions.clone()))
                .collect();
            (term.as_str(), postings)
        })
    }

    /// Buffered documents by local id.
    pub fn documents(&self) -> impl Iterator<Item = (u32, &Document)> + '_ {
        self.documents
            .iter()
            .enumerate()
            .map(|(id, doc)| (id as u32, doc))
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.terms.clear();
        self.documents.clear();
        self.term_bytes = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn test_add_assigns_dense_ids() {
        let mut buffer = IndexBuffer::new();
        assert!(buffer.is_empty());
        assert_eq!(buffer.add(Document::new("cat dog cat"), terms("cat dog cat")), 0);
        assert_eq!(buffer.add(Document::new("cat bird"), terms("cat bird")), 1);

        assert_eq!(buffer.doc_count(), 2);
        assert_eq!(buffer.term_count(), 3);
        assert_eq!(buffer.term_bytes(), 3 + 3 + 4);

        let postings: Vec<(&str, Vec<PostingData>)> = buffer.postings().collect();
        assert_eq!(postings[0].0, "bird");
        assert_eq!(postings[1].0, "cat");
        assert_eq!(
            postings[1].1,
            vec![
                PostingData::with_positions(0, vec![0, 2]),
                PostingData::with_positions(1, vec![0]),
            ]
        );
    }

    #[test]
    fn test_clear() {
        let mut buffer = IndexBuffer::new();
        buffer.add(Document::new("a"), terms("a"));
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.term_bytes(), 0);
        assert_eq!(buffer.add(Document::new("b"), terms("b")), 0);
    }
}
