//! Flushing, merging and reopening an index directory.

use std::path::Path;
use std::sync::Arc;

use pagedex::analysis::StandardAnalyzer;
use pagedex::document::Document;
use pagedex::error::PagedexError;
use pagedex::index::{IndexConfig, InvertedIndex};
use tempfile::TempDir;

fn open(dir: &Path, config: IndexConfig) -> pagedex::error::Result<InvertedIndex> {
    InvertedIndex::create_or_open(dir, Arc::new(StandardAnalyzer::new()?), config)
}

#[test]
fn test_flush_threshold_creates_segments() {
    let temp_dir = TempDir::new().unwrap();
    let mut index = open(temp_dir.path(), IndexConfig::default().with_flush_threshold(3)).unwrap();

    for text in ["one", "two", "three"] {
        index.add_document(Document::new(text)).unwrap();
    }
    assert_eq!(index.num_segments(), 1);
    assert_eq!(index.buffered_documents(), 0);
    assert_eq!(index.num_documents(0).unwrap(), 3);

    index.add_document(Document::new("four")).unwrap();
    assert_eq!(index.num_segments(), 1);
    assert_eq!(index.buffered_documents(), 1);

    // Buffered documents are not visible to queries.
    assert!(index.search_query("four").unwrap().is_empty());
    index.flush().unwrap();
    assert_eq!(index.search_query("four").unwrap(), vec![Document::new("four")]);
}

#[test]
fn test_merge_shifts_second_segment_ids() {
    let temp_dir = TempDir::new().unwrap();
    let mut index = open(temp_dir.path(), IndexConfig::positional()).unwrap();

    index.add_document(Document::new("apple banana")).unwrap();
    index.add_document(Document::new("banana cherry")).unwrap();
    index.flush().unwrap();
    index.add_document(Document::new("cherry apple")).unwrap();
    index.flush().unwrap();
    assert_eq!(index.num_segments(), 2);

    index.merge_all_segments().unwrap();
    assert_eq!(index.num_segments(), 1);
    assert_eq!(index.num_documents(0).unwrap(), 3);

    let snapshot = index.index_segment_positional(0).unwrap().unwrap();
    assert_eq!(snapshot.inverted_lists["apple"], vec![0, 2]);
    assert_eq!(snapshot.inverted_lists["banana"], vec![0, 1]);
    assert_eq!(snapshot.inverted_lists["cherry"], vec![1, 2]);
    assert_eq!(snapshot.positions[&("apple".to_string(), 2)], vec![1]);
    assert_eq!(snapshot.documents[&2].text(), "cherry apple");

    assert!(!temp_dir.path().join("segment_1").exists());
    assert!(!temp_dir.path().join("docstore_1").exists());
}

#[test]
fn test_repeated_merges_keep_insertion_order() {
    let temp_dir = TempDir::new().unwrap();
    let config = IndexConfig::default()
        .with_flush_threshold(2)
        .with_merge_threshold(2);
    let mut index = open(temp_dir.path(), config).unwrap();

    let texts: Vec<String> = (0..11).map(|i| format!("doc{i} shared")).collect();
    for text in &texts {
        index.add_document(Document::new(text.as_str())).unwrap();
    }
    index.flush().unwrap();

    let found: Vec<String> = index
        .search_query("shared")
        .unwrap()
        .into_iter()
        .map(Document::into_text)
        .collect();
    assert_eq!(found, texts);
}

#[test]
fn test_reopen_recovers_segments() {
    let temp_dir = TempDir::new().unwrap();
    let config = IndexConfig::positional()
        .with_page_size(64)
        .with_flush_threshold(2);

    {
        let mut index = open(temp_dir.path(), config.clone()).unwrap();
        for text in ["red fox", "blue fox", "green frog"] {
            index.add_document(Document::new(text)).unwrap();
        }
        index.close().unwrap();
    }

    let index = open(temp_dir.path(), config).unwrap();
    assert_eq!(index.num_segments(), 2);
    assert_eq!(
        index.documents().unwrap(),
        vec![
            Document::new("red fox"),
            Document::new("blue fox"),
            Document::new("green frog"),
        ]
    );
    assert_eq!(index.search_phrase_query(&["blue", "fox"]).unwrap().len(), 1);
}

#[test]
fn test_reopen_with_other_settings_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    {
        let mut index = open(temp_dir.path(), IndexConfig::default().with_page_size(128)).unwrap();
        index.add_document(Document::new("hello")).unwrap();
        index.close().unwrap();
    }

    let err = open(temp_dir.path(), IndexConfig::default()).unwrap_err();
    assert!(matches!(err, PagedexError::InvalidConfig(_)));

    let err = open(
        temp_dir.path(),
        IndexConfig::positional().with_page_size(128),
    )
    .unwrap_err();
    assert!(matches!(err, PagedexError::InvalidConfig(_)));
}

#[test]
fn test_interrupted_merge_leftovers_are_removed() {
    let temp_dir = TempDir::new().unwrap();
    {
        let mut index = open(temp_dir.path(), IndexConfig::default()).unwrap();
        index.add_document(Document::new("kept")).unwrap();
        index.close().unwrap();
    }
    std::fs::write(temp_dir.path().join("segment_merged.tmp"), b"junk").unwrap();
    std::fs::write(temp_dir.path().join("docstore_merged.tmp"), b"junk").unwrap();

    let index = open(temp_dir.path(), IndexConfig::default()).unwrap();
    assert_eq!(index.num_segments(), 1);
    assert!(!temp_dir.path().join("segment_merged.tmp").exists());
    assert_eq!(index.search_query("kept").unwrap().len(), 1);
}

#[test]
fn test_terms_longer_than_a_page() {
    let temp_dir = TempDir::new().unwrap();
    let config = IndexConfig::positional().with_page_size(64);
    let mut index = open(temp_dir.path(), config).unwrap();

    let long_term = "x".repeat(200);
    let text = format!("short {long_term} tail");
    index.add_document(Document::new(text.as_str())).unwrap();
    index.add_document(Document::new("short again")).unwrap();
    index.flush().unwrap();

    assert_eq!(index.search_query(&long_term).unwrap(), vec![Document::new(text.as_str())]);
    assert_eq!(
        index.search_phrase_query(&[long_term.as_str(), "tail"]).unwrap().len(),
        1
    );
    assert_eq!(index.document_frequency(0, "short").unwrap(), 2);
}
