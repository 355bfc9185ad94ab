//! The inverted index: buffer, flushing, merging and segment bookkeeping.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::analysis::Analyzer;
use crate::document::Document;
use crate::error::{PagedexError, Result};
use crate::index::buffer::IndexBuffer;
use crate::index::config::{IndexConfig, IndexManifest};
use crate::index::merge::Compactor;
use crate::segment::format::{SegmentFiles, list_sequences, list_staging_files};
use crate::segment::reader::SegmentReader;
use crate::segment::writer::{SegmentSummary, SegmentWriter};

/// A disk-based inverted index over one directory.
///
/// Documents are buffered in memory and written as an immutable segment once
/// the flush threshold is reached (or on [`flush`](Self::flush)). When the
/// number of segments reaches the merge threshold, all segments are merged
/// pairwise. Queries only see flushed segments.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use pagedex::analysis::StandardAnalyzer;
/// use pagedex::document::Document;
/// use pagedex::index::{IndexConfig, InvertedIndex};
///
/// # fn main() -> pagedex::error::Result<()> {
/// let dir = tempfile::TempDir::new()?;
/// let analyzer = Arc::new(StandardAnalyzer::new()?);
/// let mut index = InvertedIndex::create_or_open(dir.path(), analyzer, IndexConfig::default())?;
///
/// index.add_document(Document::new("cat dog"))?;
/// index.add_document(Document::new("cat bird"))?;
/// index.flush()?;
///
/// assert_eq!(index.num_segments(), 1);
/// assert_eq!(index.search_and_query(&["cat", "dog"])?.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct InvertedIndex {
    directory: PathBuf,
    analyzer: Arc<dyn Analyzer>,
    config: IndexConfig,
    buffer: IndexBuffer,
    segment_count: u32,
}

impl InvertedIndex {
    /// Open the index in `directory`, creating the directory and an empty
    /// index if needed.
    ///
    /// An existing index must have been created with the same page size and
    /// positional flag. Leftover staging files of an interrupted flush or
    /// merge are removed.
    pub fn create_or_open<P: AsRef<Path>>(
        directory: P,
        analyzer: Arc<dyn Analyzer>,
        config: IndexConfig,
    ) -> Result<Self> {
        config.validate()?;
        let directory = directory.as_ref().to_path_buf();
        if directory.exists() && !directory.is_dir() {
            return Err(PagedexError::precondition(format!(
                "{} is not a directory",
                directory.display()
            )));
        }
        fs::create_dir_all(&directory)?;

        match IndexManifest::load(&directory)? {
            Some(manifest) => manifest.check(&config)?,
            None => IndexManifest::from_config(&config).store(&directory)?,
        }

        let compactor = Compactor::new(&directory, config.clone());
        compactor.recover()?;
        for path in list_staging_files(&directory)? {
            warn!("Removing leftover staging file {}", path.display());
            fs::remove_file(&path)?;
        }

        let mut sequences = list_sequences(&directory)?;
        if let Some(merged) = interrupted_merge(&sequences) {
            let total = merged * 2 + (sequences.len() as u32 - merged);
            warn!("Resuming interrupted merge at segment {}", merged * 2);
            for pair in merged..total / 2 {
                compactor.merge_pair(pair * 2, pair)?;
            }
            sequences = list_sequences(&directory)?;
        }
        if let Some((expected, found)) = sequences
            .iter()
            .enumerate()
            .find(|(expected, found)| *expected as u32 != **found)
        {
            return Err(PagedexError::segment(format!(
                "segment numbering has a gap: expected segment_{expected}, found segment_{found}"
            )));
        }

        info!(
            "Opened index {} ({} segments, positional={}, page size {})",
            directory.display(),
            sequences.len(),
            config.positional,
            config.page_size
        );

        Ok(InvertedIndex {
            directory,
            analyzer,
            config,
            buffer: IndexBuffer::new(),
            segment_count: sequences.len() as u32,
        })
    }

    /// The index directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// The active configuration.
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Whether token positions are stored.
    pub fn is_positional(&self) -> bool {
        self.config.positional
    }

    /// Number of documents waiting for the next flush.
    pub fn buffered_documents(&self) -> usize {
        self.buffer.doc_count()
    }

    /// Number of on-disk segments.
    pub fn num_segments(&self) -> u32 {
        self.segment_count
    }

    /// Analyze and buffer a document, flushing when the buffer is full.
    pub fn add_document(&mut self, document: Document) -> Result<()> {
        let terms = self.analyzer.analyze(document.text())?;
        self.buffer.add(document, terms);

        if self.buffer.doc_count() >= self.config.flush_threshold {
            self.flush()?;
        }
        Ok(())
    }

    /// Write the buffered documents as a new segment.
    ///
    /// Does nothing when the buffer is empty. May trigger a merge.
    pub fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            debug!("Flush skipped: buffer is empty");
            return Ok(());
        }

        let sequence = self.segment_count;
        let staging = SegmentFiles::staging(&self.directory, &sequence.to_string());
        let written = self
            .write_buffer(staging.clone())
            .and_then(|summary| {
                staging.rename_to(
                    &SegmentFiles::committed(&self.directory, sequence),
                    self.config.positional,
                )?;
                Ok(summary)
            });
        let summary = match written {
            Ok(summary) => summary,
            Err(e) => {
                staging.discard();
                return Err(e);
            }
        };

        debug_assert_eq!(summary.term_bytes, self.buffer.term_bytes());
        info!(
            "Flushed segment {sequence}: {} documents, {} terms",
            summary.documents, summary.terms
        );

        self.buffer.clear();
        self.segment_count += 1;

        // Only even counts can be merged pairwise; a threshold lowered on
        // reopen is honored at the next even count.
        if self.segment_count as usize >= self.config.merge_threshold
            && self.segment_count % 2 == 0
        {
            self.merge_all_segments()?;
        }
        Ok(())
    }

    fn write_buffer(&self, staging: SegmentFiles) -> Result<SegmentSummary> {
        let mut writer = SegmentWriter::create(
            staging,
            self.config.page_size,
            self.config.codec(),
            self.config.positional,
        )?;
        for (term, postings) in self.buffer.postings() {
            writer.add_term(term, &postings)?;
        }
        for (id, document) in self.buffer.documents() {
            writer.add_document(id, document.clone())?;
        }
        writer.finish()
    }

    /// Merge all segments pairwise: `(0, 1) → 0`, `(2, 3) → 1`, and so on.
    ///
    /// Requires an even number of segments.
    pub fn merge_all_segments(&mut self) -> Result<()> {
        if self.segment_count % 2 != 0 {
            return Err(PagedexError::precondition(format!(
                "cannot merge an odd number of segments ({})",
                self.segment_count
            )));
        }
        if self.segment_count == 0 {
            return Ok(());
        }

        info!("Merging {} segments", self.segment_count);
        let compactor = Compactor::new(&self.directory, self.config.clone());
        for pair in 0..self.segment_count / 2 {
            compactor.merge_pair(pair * 2, pair)?;
        }
        self.segment_count /= 2;
        Ok(())
    }

    /// Flush pending documents and release the index.
    pub fn close(mut self) -> Result<()> {
        self.flush()
    }

    pub(super) fn analyze(&self, text: &str) -> Result<Vec<String>> {
        self.analyzer.analyze(text)
    }

    fn segment_files(&self, segment: u32) -> SegmentFiles {
        SegmentFiles::committed(&self.directory, segment)
    }

    /// Open segment `segment` for reading.
    pub fn open_segment(&self, segment: u32) -> Result<SegmentReader> {
        if segment >= self.segment_count {
            return Err(PagedexError::precondition(format!(
                "segment {segment} does not exist ({} segments)",
                self.segment_count
            )));
        }
        SegmentReader::open(
            &self.segment_files(segment),
            self.config.page_size,
            self.config.positional,
        )
    }
}

/// Number of pairs already merged when `sequences` is the state left by an
/// interrupted [`InvertedIndex::merge_all_segments`]: merged segments
/// `0..p` followed by the unmerged tail `2p..n` of even length.
fn interrupted_merge(sequences: &[u32]) -> Option<u32> {
    let merged = sequences
        .iter()
        .enumerate()
        .position(|(expected, found)| expected as u32 != *found)? as u32;
    let tail = &sequences[merged as usize..];
    let contiguous = tail
        .iter()
        .enumerate()
        .all(|(i, found)| *found == merged * 2 + i as u32);
    (merged > 0 && contiguous && tail.len() % 2 == 0).then_some(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::StandardAnalyzer;
    use tempfile::TempDir;

    fn open(dir: &Path, config: IndexConfig) -> InvertedIndex {
        InvertedIndex::create_or_open(dir, Arc::new(StandardAnalyzer::new().unwrap()), config)
            .unwrap()
    }

    #[test]
    fn test_flush_threshold() {
        let temp_dir = TempDir::new().unwrap();
        let mut index = open(temp_dir.path(), IndexConfig::default().with_flush_threshold(2));

        index.add_document(Document::new("one")).unwrap();
        assert_eq!(index.num_segments(), 0);
        index.add_document(Document::new("two")).unwrap();
        assert_eq!(index.num_segments(), 1);
        assert_eq!(index.buffered_documents(), 0);
        index.add_document(Document::new("three")).unwrap();
        assert_eq!(index.num_segments(), 1);
        assert_eq!(index.buffered_documents(), 1);
    }

    #[test]
    fn test_empty_flush_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let mut index = open(temp_dir.path(), IndexConfig::default());
        index.flush().unwrap();
        assert_eq!(index.num_segments(), 0);
    }

    #[test]
    fn test_merge_threshold_triggers_merge() {
        let temp_dir = TempDir::new().unwrap();
        let config = IndexConfig::default()
            .with_flush_threshold(1)
            .with_merge_threshold(4);
        let mut index = open(temp_dir.path(), config);

        for text in ["a1", "b2", "c3"] {
            index.add_document(Document::new(text)).unwrap();
        }
        assert_eq!(index.num_segments(), 3);
        index.add_document(Document::new("d4")).unwrap();
        assert_eq!(index.num_segments(), 2);
    }

    #[test]
    fn test_merge_requires_even_count() {
        let temp_dir = TempDir::new().unwrap();
        let mut index = open(temp_dir.path(), IndexConfig::default().with_flush_threshold(1));
        index.add_document(Document::new("alone")).unwrap();
        let err = index.merge_all_segments().unwrap_err();
        assert!(matches!(err, PagedexError::Precondition(_)));
    }

    #[test]
    fn test_staging_files_removed_on_open() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("segment_0.tmp"), b"partial").unwrap();
        let index = open(temp_dir.path(), IndexConfig::default());
        assert_eq!(index.num_segments(), 0);
        assert!(!temp_dir.path().join("segment_0.tmp").exists());
    }

    #[test]
    fn test_open_segment_out_of_range() {
        let temp_dir = TempDir::new().unwrap();
        let index = open(temp_dir.path(), IndexConfig::default());
        assert!(index.open_segment(0).is_err());
    }

    #[test]
    fn test_interrupted_merge_layout() {
        assert_eq!(interrupted_merge(&[0, 1, 2, 3]), None);
        assert_eq!(interrupted_merge(&[0, 2, 3]), Some(1));
        assert_eq!(interrupted_merge(&[0, 1, 4, 5, 6, 7]), Some(2));
        assert_eq!(interrupted_merge(&[0, 2]), None);
        assert_eq!(interrupted_merge(&[1, 2]), None);
        assert_eq!(interrupted_merge(&[0, 2, 4, 5]), None);
    }

    #[test]
    fn test_lowered_merge_threshold_waits_for_even_count() {
        let temp_dir = TempDir::new().unwrap();
        let config = IndexConfig::default()
            .with_flush_threshold(1)
            .with_merge_threshold(8);
        {
            let mut index = open(temp_dir.path(), config.clone());
            index.add_document(Document::new("first")).unwrap();
            index.add_document(Document::new("second")).unwrap();
            index.close().unwrap();
        }

        let mut index = open(temp_dir.path(), config.with_merge_threshold(2));
        index.add_document(Document::new("third")).unwrap();
        assert_eq!(index.num_segments(), 3);
        assert_eq!(index.search_query("third").unwrap().len(), 1);

        index.add_document(Document::new("fourth")).unwrap();
        assert_eq!(index.num_segments(), 2);
        let texts: Vec<String> = index
            .documents()
            .unwrap()
            .into_iter()
            .map(Document::into_text)
            .collect();
        assert_eq!(texts, vec!["first", "second", "third", "fourth"]);
    }

    #[test]
    fn test_open_resumes_interrupted_merge() {
        let temp_dir = TempDir::new().unwrap();
        let config = IndexConfig::default()
            .with_flush_threshold(1)
            .with_merge_threshold(100);
        {
            let mut index = open(temp_dir.path(), config.clone());
            for text in ["a1", "b2", "c3", "d4", "e5", "f6"] {
                index.add_document(Document::new(text)).unwrap();
            }
            index.close().unwrap();
        }

        // The first pair was merged, then the process stopped while deleting
        // the inputs of the second pair.
        let compactor = Compactor::new(temp_dir.path(), config.clone());
        compactor.merge_pair(0, 0).unwrap();
        compactor.stage_pair(2, 1).unwrap();
        let dir = temp_dir.path();
        SegmentFiles::committed(dir, 2).delete(false).unwrap();

        let index = open(dir, config);
        assert_eq!(index.num_segments(), 3);
        let texts: Vec<String> = index
            .documents()
            .unwrap()
            .into_iter()
            .map(Document::into_text)
            .collect();
        assert_eq!(texts, vec!["a1", "b2", "c3", "d4", "e5", "f6"]);
        assert!(list_staging_files(dir).unwrap().is_empty());
    }
}
