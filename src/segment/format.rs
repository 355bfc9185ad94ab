//! Binary layout of an on-disk segment.
//!
//! Every integer is big-endian.
//!
//! ```text
//! segment_N   [count_page:u32][count_offset:u32]
//!             [keyword blob: term bytes back to back, dictionary order]
//!             [term_count:u32]                    <- (count_page, count_offset)
//!             [DictionarySlot; term_count]
//!
//! posting_N   per term: [encoded doc ids][frequency:u32; doc_count]
//!
//! position_N  encoded position lists, back to back           (positional)
//! meta_N      [PositionPointer; total postings]               (positional)
//! docstore_N  raw documents keyed by local id
//! ```
//!
//! The position pointer of the `r`-th posting of a term lives in metadata
//! slot `meta_start + r`, where `meta_start` is the number of postings of
//! all earlier terms.

use std::fs;
use std::path::{Path, PathBuf};

use log::warn;

use crate::error::{PagedexError, Result};
use crate::storage::page::{PageCursor, PageReader, PageWriter};

/// Size of the dictionary header.
pub const HEADER_SIZE: u64 = 8;

/// Size of one [`DictionarySlot`] on disk.
pub const SLOT_SIZE: u64 = 24;

/// Size of one [`PositionPointer`] on disk.
pub const POINTER_SIZE: u64 = 12;

/// Size of one inline term frequency.
pub const FREQUENCY_SIZE: u64 = 4;

/// Suffix of files that are still being written.
pub const STAGING_SUFFIX: &str = ".tmp";

/// The files that make up a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentFile {
    /// Keyword blob, term count and dictionary slots.
    Dictionary,
    /// Doc-id lists and term frequencies.
    Posting,
    /// Encoded position lists.
    Position,
    /// Position pointers.
    PositionMeta,
    /// Raw documents.
    Documents,
}

impl SegmentFile {
    /// File name prefix.
    pub fn prefix(&self) -> &'static str {
        match self {
            SegmentFile::Dictionary => "segment",
            SegmentFile::Posting => "posting",
            SegmentFile::Position => "position",
            SegmentFile::PositionMeta => "meta",
            SegmentFile::Documents => "docstore",
        }
    }

    /// Files present in a segment of the given kind.
    pub fn all(positional: bool) -> &'static [SegmentFile] {
        if positional {
            &[
                SegmentFile::Dictionary,
                SegmentFile::Posting,
                SegmentFile::Position,
                SegmentFile::PositionMeta,
                SegmentFile::Documents,
            ]
        } else {
            &[
                SegmentFile::Dictionary,
                SegmentFile::Posting,
                SegmentFile::Documents,
            ]
        }
    }
}

/// Names the files of one segment inside an index directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentFiles {
    directory: PathBuf,
    name: String,
    staging: bool,
}

impl SegmentFiles {
    /// The committed files of segment `sequence`.
    pub fn committed<P: AsRef<Path>>(directory: P, sequence: u32) -> Self {
        SegmentFiles {
            directory: directory.as_ref().to_path_buf(),
            name: sequence.to_string(),
            staging: false,
        }
    }

    /// Staging files for a segment that is being written.
    pub fn staging<P: AsRef<Path>>(directory: P, name: &str) -> Self {
        SegmentFiles {
            directory: directory.as_ref().to_path_buf(),
            name: name.to_string(),
            staging: true,
        }
    }

    /// Name part shared by all files of this segment.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of one file of this segment.
    pub fn path(&self, file: SegmentFile) -> PathBuf {
        let suffix = if self.staging { STAGING_SUFFIX } else { "" };
        self.directory
            .join(format!("{}_{}{}", file.prefix(), self.name, suffix))
    }

    /// Whether the dictionary file exists.
    pub fn exists(&self) -> bool {
        self.path(SegmentFile::Dictionary).exists()
    }

    /// Whether every file of this segment exists.
    pub fn is_complete(&self, positional: bool) -> bool {
        SegmentFile::all(positional)
            .iter()
            .all(|&file| self.path(file).exists())
    }

    /// Move every file of this segment onto the names of `target`.
    ///
    /// The dictionary is moved last, so `target` only becomes visible once
    /// all of its other files are in place.
    pub fn rename_to(&self, target: &SegmentFiles, positional: bool) -> Result<()> {
        for &file in SegmentFile::all(positional).iter().rev() {
            self.rename_file(target, file)?;
        }
        Ok(())
    }

    /// Finish an interrupted [`rename_to`](Self::rename_to): files already
    /// moved are skipped.
    pub fn rename_remaining_to(&self, target: &SegmentFiles, positional: bool) -> Result<()> {
        for &file in SegmentFile::all(positional).iter().rev() {
            if self.path(file).exists() {
                self.rename_file(target, file)?;
            }
        }
        Ok(())
    }

    fn rename_file(&self, target: &SegmentFiles, file: SegmentFile) -> Result<()> {
        let from = self.path(file);
        let to = target.path(file);
        fs::rename(&from, &to).map_err(|e| {
            PagedexError::storage(format!(
                "Failed to rename {} to {}: {e}",
                from.display(),
                to.display()
            ))
        })
    }

    /// Delete every file of this segment. Missing files are an error.
    pub fn delete(&self, positional: bool) -> Result<()> {
        for &file in SegmentFile::all(positional) {
            let path = self.path(file);
            fs::remove_file(&path).map_err(|e| {
                PagedexError::storage(format!("Failed to delete {}: {e}", path.display()))
            })?;
        }
        Ok(())
    }

    /// Best-effort removal of whatever files of this segment exist.
    pub fn discard(&self) {
        for &file in SegmentFile::all(true) {
            let path = self.path(file);
            if path.exists()
                && let Err(e) = fs::remove_file(&path)
            {
                warn!("Failed to discard {}: {e}", path.display());
            }
        }
    }
}

/// Extract the sequence number from a committed dictionary file name.
pub fn parse_sequence(file_name: &str) -> Option<u32> {
    let rest = file_name.strip_prefix("segment_")?;
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    rest.parse().ok()
}

/// Sequence numbers of all committed segments in `directory`, ascending.
pub fn list_sequences<P: AsRef<Path>>(directory: P) -> Result<Vec<u32>> {
    let mut sequences = Vec::new();
    for entry in fs::read_dir(directory.as_ref())? {
        let entry = entry?;
        if let Some(sequence) = entry.file_name().to_str().and_then(parse_sequence) {
            sequences.push(sequence);
        }
    }
    sequences.sort_unstable();
    Ok(sequences)
}

/// Paths of leftover staging files in `directory`.
pub fn list_staging_files<P: AsRef<Path>>(directory: P) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(directory.as_ref())? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.ends_with(STAGING_SUFFIX) || name.ends_with(".partial") {
            paths.push(entry.path());
        }
    }
    paths.sort();
    Ok(paths)
}

/// Location and size of a byte range inside one segment file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PositionPointer {
    /// Page of the first byte.
    pub page: u32,
    /// Offset of the first byte inside that page.
    pub offset: u32,
    /// Length of the range in bytes.
    pub len: u32,
}

impl PositionPointer {
    /// Pointer to `len` bytes starting at `cursor`.
    pub fn new(cursor: PageCursor, len: u32) -> Self {
        PositionPointer {
            page: cursor.page,
            offset: cursor.offset,
            len,
        }
    }

    /// Cursor at the first byte.
    pub fn cursor(&self) -> PageCursor {
        PageCursor::new(self.page, self.offset)
    }

    /// Serialize into a page file.
    pub fn write_to(&self, writer: &mut PageWriter) -> Result<()> {
        writer.write_u32(self.page)?;
        writer.write_u32(self.offset)?;
        writer.write_u32(self.len)
    }

    /// Deserialize from a page file.
    pub fn read_from(reader: &mut PageReader<'_>, cursor: &mut PageCursor) -> Result<Self> {
        Ok(PositionPointer {
            page: reader.read_u32(cursor)?,
            offset: reader.read_u32(cursor)?,
            len: reader.read_u32(cursor)?,
        })
    }
}

/// Fixed-size dictionary record for one term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DictionarySlot {
    /// Length of the term in the keyword blob.
    pub term_len: u32,
    /// Encoded doc-id list in the posting file. The term frequencies follow
    /// it directly.
    pub postings: PositionPointer,
    /// Number of documents containing the term.
    pub doc_count: u32,
    /// First position-metadata slot of this term.
    pub meta_start: u32,
}

impl DictionarySlot {
    /// Serialize into the dictionary file.
    pub fn write_to(&self, writer: &mut PageWriter) -> Result<()> {
        writer.write_u32(self.term_len)?;
        self.postings.write_to(writer)?;
        writer.write_u32(self.doc_count)?;
        writer.write_u32(self.meta_start)
    }

    /// Deserialize from the dictionary file.
    pub fn read_from(reader: &mut PageReader<'_>, cursor: &mut PageCursor) -> Result<Self> {
        let term_len = reader.read_u32(cursor)?;
        let postings = PositionPointer::read_from(reader, cursor)?;
        let doc_count = reader.read_u32(cursor)?;
        let meta_start = reader.read_u32(cursor)?;
        Ok(DictionarySlot {
            term_len,
            postings,
            doc_count,
            meta_start,
        })
    }
}

/// One decoded posting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingEntry {
    /// Local document id.
    pub doc_id: u32,
    /// Occurrences of the term in the document.
    pub frequency: u32,
    /// Where the document's positions are stored (positional segments).
    pub positions: Option<PositionPointer>,
}

/// A posting handed to the segment writer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PostingData {
    /// Local document id.
    pub doc_id: u32,
    /// Occurrences of the term in the document.
    pub frequency: u32,
    /// Token offsets; empty for non-positional segments.
    pub positions: Vec<u32>,
}

impl PostingData {
    /// Posting with explicit positions; the frequency is their count.
    pub fn with_positions(doc_id: u32, positions: Vec<u32>) -> Self {
        PostingData {
            doc_id,
            frequency: positions.len() as u32,
            positions,
        }
    }

    /// Posting without positions.
    pub fn with_frequency(doc_id: u32, frequency: u32) -> Self {
        PostingData {
            doc_id,
            frequency,
            positions: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::page::PageStore;
    use tempfile::TempDir;

    #[test]
    fn test_parse_sequence() {
        assert_eq!(parse_sequence("segment_0"), Some(0));
        assert_eq!(parse_sequence("segment_17"), Some(17));
        assert_eq!(parse_sequence("segment_3.tmp"), None);
        assert_eq!(parse_sequence("segment_merged"), None);
        assert_eq!(parse_sequence("segment_"), None);
        assert_eq!(parse_sequence("posting_3"), None);
    }

    #[test]
    fn test_file_names() {
        let committed = SegmentFiles::committed("/idx", 4);
        assert_eq!(
            committed.path(SegmentFile::PositionMeta),
            PathBuf::from("/idx/meta_4")
        );

        let staging = SegmentFiles::staging("/idx", "merged");
        assert_eq!(
            staging.path(SegmentFile::Documents),
            PathBuf::from("/idx/docstore_merged.tmp")
        );
    }

    #[test]
    fn test_slot_round_trip_across_pages() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("dict");

        let slot = DictionarySlot {
            term_len: 5,
            postings: PositionPointer {
                page: 3,
                offset: 61,
                len: 9,
            },
            doc_count: 2,
            meta_start: 11,
        };

        let mut writer = PageWriter::create(&path, 64).unwrap();
        writer.write_bytes(&[0u8; 50]).unwrap();
        let start = writer.cursor();
        slot.write_to(&mut writer).unwrap();
        assert_eq!(writer.cursor().absolute(64), 50 + SLOT_SIZE);
        writer.finish().unwrap();

        let store = PageStore::open(&path, 64).unwrap();
        let mut reader = PageReader::new(&store);
        let mut cursor = start;
        assert_eq!(DictionarySlot::read_from(&mut reader, &mut cursor).unwrap(), slot);
    }

    #[test]
    fn test_list_sequences_and_staging() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["segment_2", "segment_0", "segment_1.tmp", "posting_0", "docstore_5.partial"] {
            fs::write(temp_dir.path().join(name), b"").unwrap();
        }

        assert_eq!(list_sequences(temp_dir.path()).unwrap(), vec![0, 2]);
        let staging = list_staging_files(temp_dir.path()).unwrap();
        assert_eq!(staging.len(), 2);
    }

    #[test]
    fn test_rename_remaining_skips_moved_files() {
        let temp_dir = TempDir::new().unwrap();
        let staging = SegmentFiles::staging(temp_dir.path(), "merged_0_0");
        let target = SegmentFiles::committed(temp_dir.path(), 0);
        for &file in SegmentFile::all(false) {
            fs::write(staging.path(file), file.prefix()).unwrap();
        }
        assert!(staging.is_complete(false));

        // Documents were already moved before the interruption.
        fs::rename(
            staging.path(SegmentFile::Documents),
            target.path(SegmentFile::Documents),
        )
        .unwrap();
        assert!(!staging.is_complete(false));

        staging.rename_remaining_to(&target, false).unwrap();
        assert!(target.is_complete(false));
        assert!(!staging.path(SegmentFile::Dictionary).exists());
        assert_eq!(
            fs::read(target.path(SegmentFile::Posting)).unwrap(),
            b"posting"
        );
    }
}
