//! Pipeline analyzer that combines a tokenizer and filters.
//!
//! # Examples
//!
//! ```
//! use pagedex::analysis::Analyzer;
//! use pagedex::analysis::analyzer::pipeline::PipelineAnalyzer;
//! use pagedex::analysis::tokenizer::regex::RegexTokenizer;
//! use pagedex::analysis::token_filter::lowercase::LowercaseFilter;
//! use pagedex::analysis::token_filter::stop::StopFilter;
//! use std::sync::Arc;
//!
//! let tokenizer = Arc::new(RegexTokenizer::new().unwrap());
//! let analyzer = PipelineAnalyzer::new(tokenizer)
//!     .add_filter(Arc::new(LowercaseFilter::new()))
//!     .add_filter(Arc::new(StopFilter::from_words(vec!["the", "and"])));
//!
//! let terms = analyzer.analyze("Hello THE world AND test").unwrap();
//! assert_eq!(terms, vec!["hello", "world", "test"]);
//! ```

use std::sync::Arc;

use crate::analysis::analyzer::Analyzer;
use crate::analysis::token::TokenStream;
use crate::analysis::token_filter::Filter;
use crate::analysis::tokenizer::Tokenizer;
use crate::error::Result;

/// A configurable analyzer: one tokenizer followed by filters applied in
/// the order they were added.
#[derive(Clone)]
pub struct PipelineAnalyzer {
    tokenizer: Arc<dyn Tokenizer>,
    filters: Vec<Arc<dyn Filter>>,
    name: String,
}

impl PipelineAnalyzer {
    /// Create a new pipeline analyzer with the given tokenizer.
    pub fn new(tokenizer: Arc<dyn Tokenizer>) -> Self {
        PipelineAnalyzer {
            name: format!("pipeline_{}", tokenizer.name()),
            tokenizer,
            filters: Vec::new(),
        }
    }

    /// Add a filter to the pipeline.
    pub fn add_filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Set a custom name for this analyzer.
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Name given to this pipeline.
    pub fn pipeline_name(&self) -> &str {
        &self.name
    }

    /// Run the pipeline and return the raw token stream.
    pub fn token_stream(&self, text: &str) -> Result<TokenStream> {
        let mut tokens = self.tokenizer.tokenize(text)?;
        for filter in &self.filters {
            tokens = filter.filter(tokens)?;
        }
        Ok(tokens)
    }
}

impl Analyzer for PipelineAnalyzer {
    fn analyze(&self, text: &str) -> Result<Vec<String>> {
        Ok(self
            .token_stream(text)?
            .filter(|token| !token.is_empty())
            .map(|token| token.text)
            .collect())
    }

    fn name(&self) -> &'static str {
        "pipeline"
    }
}

impl std::fmt::Debug for PipelineAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineAnalyzer")
            .field("name", &self.name)
            .field("tokenizer", &self.tokenizer.name())
            .field(
                "filters",
                &self.filters.iter().map(|f| f.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::token_filter::lowercase::LowercaseFilter;
    use crate::analysis::tokenizer::regex::RegexTokenizer;

    #[test]
    fn test_filters_run_in_order() {
        let tokenizer = Arc::new(RegexTokenizer::new().unwrap());
        let analyzer = PipelineAnalyzer::new(tokenizer)
            .add_filter(Arc::new(LowercaseFilter::new()))
            .with_name("lower");

        assert_eq!(analyzer.pipeline_name(), "lower");
        assert_eq!(
            analyzer.analyze("Cat, DOG; cat").unwrap(),
            vec!["cat", "dog", "cat"]
        );
    }

    #[test]
    fn test_empty_text() {
        let analyzer = PipelineAnalyzer::new(Arc::new(RegexTokenizer::new().unwrap()));
        assert!(analyzer.analyze("  ,;  ").unwrap().is_empty());
    }
}
