//! The inverted index.
//!
//! - [`manager`]: [`InvertedIndex`], owning the buffer and the segment list.
//! - [`merge`]: the [`Compactor`] merging adjacent segments.
//! - [`search`]: boolean, phrase and TF-IDF queries.
//! - [`snapshot`]: whole-segment views for verification.

pub mod buffer;
pub mod collector;
pub mod config;
pub mod manager;
pub mod merge;
pub mod search;
pub mod snapshot;

pub use config::{IndexConfig, IndexManifest};
pub use manager::InvertedIndex;
pub use merge::Compactor;
pub use search::ScoredDocument;
pub use snapshot::{PositionalSegmentSnapshot, SegmentSnapshot};
