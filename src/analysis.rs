//! Text analysis for pagedex.
//!
//! Documents and queries go through the same [`Analyzer`], which turns raw
//! text into the ordered list of terms that is indexed. The index of a term
//! in that list is its position, used by phrase queries.
//!
//! ```text
//! Raw Text → Tokenizer → Filter 1 → ... → Filter N → terms
//! ```
//!
//! # Examples
//!
//! ```
//! use pagedex::analysis::{Analyzer, StandardAnalyzer};
//!
//! let analyzer = StandardAnalyzer::new().unwrap();
//! let terms = analyzer.analyze("The Quick brown fox").unwrap();
//! assert_eq!(terms, vec!["quick", "brown", "fox"]);
//! ```

pub mod analyzer;
pub mod token;
pub mod token_filter;
pub mod tokenizer;

pub use analyzer::Analyzer;
pub use analyzer::pipeline::PipelineAnalyzer;
pub use analyzer::standard::StandardAnalyzer;
