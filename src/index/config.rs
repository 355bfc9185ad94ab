//! Index configuration and the on-disk manifest.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::codec::PostingCodec;
use crate::error::{PagedexError, Result};
use crate::storage::page::{DEFAULT_PAGE_SIZE, MIN_PAGE_SIZE};

/// Name of the manifest file inside an index directory.
pub const MANIFEST_FILE: &str = "index.json";

/// Default number of buffered documents that triggers a flush.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 1000;

/// Default number of segments that triggers a merge.
pub const DEFAULT_MERGE_THRESHOLD: usize = 8;

/// Configuration of an [`InvertedIndex`](super::InvertedIndex).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Buffered documents that trigger an automatic flush.
    pub flush_threshold: usize,

    /// Segment count that triggers merging all segments pairwise.
    /// Must be even so that every segment has a partner.
    pub merge_threshold: usize,

    /// Page size of every segment file. Fixed at creation.
    pub page_size: usize,

    /// Whether token positions are stored. Fixed at creation.
    pub positional: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            merge_threshold: DEFAULT_MERGE_THRESHOLD,
            page_size: DEFAULT_PAGE_SIZE,
            positional: false,
        }
    }
}

impl IndexConfig {
    /// A default configuration that stores positions.
    pub fn positional() -> Self {
        IndexConfig {
            positional: true,
            ..Default::default()
        }
    }

    /// Set the flush threshold.
    pub fn with_flush_threshold(mut self, flush_threshold: usize) -> Self {
        self.flush_threshold = flush_threshold;
        self
    }

    /// Set the merge threshold.
    pub fn with_merge_threshold(mut self, merge_threshold: usize) -> Self {
        self.merge_threshold = merge_threshold;
        self
    }

    /// Set the page size.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set whether token positions are stored.
    pub fn with_positional(mut self, positional: bool) -> Self {
        self.positional = positional;
        self
    }

    /// Posting codec used by indexes with this configuration.
    pub fn codec(&self) -> PostingCodec {
        PostingCodec::for_index(self.positional)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.flush_threshold == 0 {
            return Err(PagedexError::invalid_config(
                "flush_threshold must be at least 1",
            ));
        }
        if self.merge_threshold < 2 || self.merge_threshold % 2 != 0 {
            return Err(PagedexError::invalid_config(format!(
                "merge_threshold must be an even number >= 2, got {}",
                self.merge_threshold
            )));
        }
        if self.page_size < MIN_PAGE_SIZE || self.page_size > u32::MAX as usize {
            return Err(PagedexError::invalid_config(format!(
                "page_size must be at least {MIN_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }
        Ok(())
    }
}

/// Properties of an index that are fixed at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexManifest {
    /// Format version of the segment files.
    pub version: u32,
    /// Page size of every segment file.
    pub page_size: usize,
    /// Whether positions are stored.
    pub positional: bool,
}

impl IndexManifest {
    /// Current segment format version.
    pub const VERSION: u32 = 1;

    /// Manifest for a new index with `config`.
    pub fn from_config(config: &IndexConfig) -> Self {
        IndexManifest {
            version: Self::VERSION,
            page_size: config.page_size,
            positional: config.positional,
        }
    }

    /// Read the manifest of the index in `directory`, if there is one.
    pub fn load<P: AsRef<Path>>(directory: P) -> Result<Option<Self>> {
        let path = directory.as_ref().join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)?;
        let manifest: IndexManifest = serde_json::from_str(&json)?;
        if manifest.version != Self::VERSION {
            return Err(PagedexError::invalid_config(format!(
                "unsupported index version {} in {}",
                manifest.version,
                path.display()
            )));
        }
        Ok(Some(manifest))
    }

    /// Write the manifest into `directory`.
    pub fn store<P: AsRef<Path>>(&self, directory: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(directory.as_ref().join(MANIFEST_FILE), json)?;
        Ok(())
    }

    /// Check that an existing index can be opened with `config`.
    pub fn check(&self, config: &IndexConfig) -> Result<()> {
        if self.page_size != config.page_size {
            return Err(PagedexError::invalid_config(format!(
                "index was created with page size {}, opened with {}",
                self.page_size, config.page_size
            )));
        }
        if self.positional != config.positional {
            return Err(PagedexError::invalid_config(format!(
                "index was created with positional={}, opened with positional={}",
                self.positional, config.positional
            )));
        }
        Ok(())
    }
}
