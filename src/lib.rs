//! # pagedex
//!
//! A disk-based inverted index stored in fixed-size pages.
//!
//! ## Features
//!
//! - Buffered indexing flushed into immutable segments
//! - Pairwise segment merging
//! - AND, OR, phrase and TF-IDF queries
//! - Optional token positions, compressed with a delta + varint codec
//! - PageRank blending for ranked search

pub mod analysis;
pub mod cli;
pub mod codec;
pub mod document;
pub mod error;
pub mod index;
pub mod ranking;
pub mod segment;
pub mod storage;
pub mod util;

pub mod prelude {
    pub use crate::analysis::{Analyzer, StandardAnalyzer};
    pub use crate::document::Document;
    pub use crate::error::{PagedexError, Result};
    pub use crate::index::{IndexConfig, InvertedIndex, ScoredDocument};
    pub use crate::ranking::PageRank;
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
