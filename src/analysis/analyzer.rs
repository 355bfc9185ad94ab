//! Core analyzer trait definition.
//!
//! An [`Analyzer`] is the full text processing pipeline used for both
//! documents and queries. It must be deterministic: the same text always
//! yields the same terms.

use crate::error::Result;

pub mod pipeline;
pub mod standard;

/// Trait for analyzers that convert text into indexed terms.
///
/// # Examples
///
/// ```
/// use pagedex::analysis::Analyzer;
/// use pagedex::error::Result;
///
/// #[derive(Debug)]
/// struct WhitespaceAnalyzer;
///
/// impl Analyzer for WhitespaceAnalyzer {
///     fn analyze(&self, text: &str) -> Result<Vec<String>> {
///         Ok(text.split_whitespace().map(str::to_string).collect())
///     }
///
///     fn name(&self) -> &'static str {
///         "whitespace"
///     }
/// }
///
/// let terms = WhitespaceAnalyzer.analyze("a b").unwrap();
/// assert_eq!(terms, vec!["a", "b"]);
/// ```
pub trait Analyzer: Send + Sync + std::fmt::Debug {
    /// Analyze the given text into its ordered list of terms.
    ///
    /// The index of a term in the returned list is its position.
    fn analyze(&self, text: &str) -> Result<Vec<String>>;

    /// Get the name of this analyzer (for debugging and logging).
    fn name(&self) -> &'static str;
}
