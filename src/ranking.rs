//! Link-based ranking combined with text relevance.

pub mod pagerank;

pub use pagerank::{PageRank, combined_search, first_line_id};
