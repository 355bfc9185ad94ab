//! Merging two adjacent segments into one.
//!
//! Both dictionaries are walked in step. Documents of the newer segment are
//! appended after those of the older one, so its local ids shift by the
//! older segment's document count.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::error::Result;
use crate::index::config::IndexConfig;
use crate::segment::format::{PostingData, STAGING_SUFFIX, SegmentFiles, list_staging_files};
use crate::segment::reader::SegmentReader;
use crate::segment::writer::{SegmentSummary, SegmentWriter};

/// Prefix of the staging name of a segment being produced by a merge.
pub const MERGE_STAGING_NAME: &str = "merged";

/// Staging name for merging `older` and `older + 1` into `target`.
pub fn merge_staging_name(older: u32, target: u32) -> String {
    format!("{MERGE_STAGING_NAME}_{older}_{target}")
}

/// Inverse of [`merge_staging_name`].
pub fn parse_merge_staging_name(name: &str) -> Option<(u32, u32)> {
    let rest = name.strip_prefix(MERGE_STAGING_NAME)?.strip_prefix('_')?;
    let (older, target) = rest.split_once('_')?;
    Some((older.parse().ok()?, target.parse().ok()?))
}

/// Merges adjacent segment pairs of one index directory.
#[derive(Debug, Clone)]
pub struct Compactor {
    directory: PathBuf,
    config: IndexConfig,
}

impl Compactor {
    /// Compactor for the index in `directory`.
    pub fn new<P: AsRef<Path>>(directory: P, config: IndexConfig) -> Self {
        Compactor {
            directory: directory.as_ref().to_path_buf(),
            config,
        }
    }

    /// Merge segments `older` and `older + 1` into segment `target`.
    ///
    /// The merged segment is fully written under staging names before either
    /// input is deleted. `target` must be `older` or a sequence number freed
    /// by an earlier merge.
    pub fn merge_pair(&self, older: u32, target: u32) -> Result<SegmentSummary> {
        let summary = self.stage_pair(older, target)?;

        let positional = self.config.positional;
        SegmentFiles::committed(&self.directory, older).delete(positional)?;
        SegmentFiles::committed(&self.directory, older + 1).delete(positional)?;
        self.staging_files(older, target)
            .rename_to(&SegmentFiles::committed(&self.directory, target), positional)?;

        info!(
            "Merged segments {older} and {} into segment {target} ({} documents, {} terms)",
            older + 1,
            summary.documents,
            summary.terms
        );
        Ok(summary)
    }

    /// Write the merge of `older` and `older + 1` under staging names,
    /// leaving both inputs untouched.
    pub(crate) fn stage_pair(&self, older: u32, target: u32) -> Result<SegmentSummary> {
        let positional = self.config.positional;
        let a = SegmentReader::open(
            &SegmentFiles::committed(&self.directory, older),
            self.config.page_size,
            positional,
        )?;
        let b = SegmentReader::open(
            &SegmentFiles::committed(&self.directory, older + 1),
            self.config.page_size,
            positional,
        )?;

        let staging = self.staging_files(older, target);
        let result = self.write_merged(&a, &b, staging.clone());
        if result.is_err() {
            staging.discard();
        }
        result
    }

    fn staging_files(&self, older: u32, target: u32) -> SegmentFiles {
        SegmentFiles::staging(&self.directory, &merge_staging_name(older, target))
    }

    /// Complete a merge that was interrupted after its inputs started being
    /// deleted. Returns the target segments that were recovered.
    ///
    /// Once an input is missing, the staged segment is the only complete
    /// copy, so the deletion and the rename are finished instead of dropping
    /// it. A staged segment whose inputs are both intact is left alone and
    /// removed later as an ordinary leftover.
    pub fn recover(&self) -> Result<Vec<u32>> {
        let positional = self.config.positional;
        let mut recovered = Vec::new();

        for path in list_staging_files(&self.directory)? {
            let Some((older, target)) = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.strip_prefix("segment_"))
                .and_then(|name| name.strip_suffix(STAGING_SUFFIX))
                .and_then(parse_merge_staging_name)
            else {
                continue;
            };

            let staging = self.staging_files(older, target);
            let files_a = SegmentFiles::committed(&self.directory, older);
            let files_b = SegmentFiles::committed(&self.directory, older + 1);
            if files_a.is_complete(positional) && files_b.is_complete(positional) {
                continue;
            }

            warn!("Completing interrupted merge of {older} and {} into {target}", older + 1);
            // A partly renamed staging segment means both inputs are already gone,
            // and `target` may share names with `older`.
            if staging.is_complete(positional) {
                files_a.discard();
                files_b.discard();
            }
            let committed = SegmentFiles::committed(&self.directory, target);
            staging.rename_remaining_to(&committed, positional)?;
            recovered.push(target);
        }
        Ok(recovered)
    }

    fn write_merged(
        &self,
        a: &SegmentReader,
        b: &SegmentReader,
        staging: SegmentFiles,
    ) -> Result<SegmentSummary> {
        let shift = a.num_documents();
        let mut writer = SegmentWriter::create(
            staging,
            self.config.page_size,
            self.config.codec(),
            self.config.positional,
        )?;

        let mut walker_a = a.walker();
        let mut walker_b = b.walker();
        let mut next_a = walker_a.next_entry()?;
        let mut next_b = walker_b.next_entry()?;
        let mut shared = 0usize;

        loop {
            let order = match (&next_a, &next_b) {
                (None, None) => break,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some((term_a, _)), Some((term_b, _))) => term_a.cmp(term_b),
            };

            match order {
                Ordering::Less => {
                    if let Some((term, slot)) = next_a.take() {
                        writer.add_term(&term, &a.read_postings_full(&slot)?)?;
                    }
                    next_a = walker_a.next_entry()?;
                }
                Ordering::Greater => {
                    if let Some((term, slot)) = next_b.take() {
                        let postings = shifted(b.read_postings_full(&slot)?, shift);
                        writer.add_term(&term, &postings)?;
                    }
                    next_b = walker_b.next_entry()?;
                }
                Ordering::Equal => {
                    if let (Some((term, slot_a)), Some((_, slot_b))) = (next_a.take(), next_b.take())
                    {
                        let mut postings = a.read_postings_full(&slot_a)?;
                        postings.extend(shifted(b.read_postings_full(&slot_b)?, shift));
                        writer.add_term(&term, &postings)?;
                        shared += 1;
                    }
                    next_a = walker_a.next_entry()?;
                    next_b = walker_b.next_entry()?;
                }
            }
        }

        for (id, document) in a.documents().iter() {
            writer.add_document(id, document.clone())?;
        }
        for (id, document) in b.documents().iter() {
            writer.add_document(id + shift, document.clone())?;
        }

        debug!(
            "Merge of {} and {}: {shared} shared terms, shift {shift}",
            a.files().name(),
            b.files().name()
        );
        writer.finish()
    }
}

fn shifted(mut postings: Vec<PostingData>, shift: u32) -> Vec<PostingData> {
    for posting in &mut postings {
        posting.doc_id += shift;
    }
    postings
}
