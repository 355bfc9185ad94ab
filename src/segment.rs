//! Immutable on-disk segments.
//!
//! A segment is produced by a flush of the in-memory buffer or by merging
//! two older segments, and is never modified afterwards. See
//! [`format`] for the byte layout.

pub mod format;
pub mod reader;
pub mod writer;

pub use format::{DictionarySlot, PositionPointer, PostingData, PostingEntry, SegmentFiles};
pub use reader::{DictionaryWalker, SegmentReader};
pub use writer::{SegmentSummary, SegmentWriter};
