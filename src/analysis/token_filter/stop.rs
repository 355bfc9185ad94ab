//! Stop filter implementation.
//!
//! Removes common words that carry little meaning for retrieval. Runs after
//! [`LowercaseFilter`](super::lowercase::LowercaseFilter) in the standard
//! pipeline, so the word list is lowercase.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use crate::analysis::token::TokenStream;
use crate::analysis::token_filter::Filter;
use crate::error::Result;

/// Default English stop words list.
const DEFAULT_ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
    "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these",
    "they", "this", "to", "was", "will", "with",
];

/// Default English stop words as a HashSet.
pub static DEFAULT_ENGLISH_STOP_WORDS_SET: LazyLock<HashSet<String>> = LazyLock::new(|| {
    DEFAULT_ENGLISH_STOP_WORDS
        .iter()
        .map(|&s| s.to_string())
        .collect()
});

/// A filter that drops stop words from the token stream.
///
/// ```
/// use pagedex::analysis::token_filter::Filter;
/// use pagedex::analysis::token_filter::stop::StopFilter;
/// use pagedex::analysis::token::Token;
///
/// let filter = StopFilter::new();
/// let tokens = vec![Token::new("this", 0), Token::new("is", 1), Token::new("test", 2)];
/// let result: Vec<_> = filter.filter(Box::new(tokens.into_iter())).unwrap().collect();
///
/// assert_eq!(result.len(), 1);
/// assert_eq!(result[0].text, "test");
/// ```
#[derive(Clone, Debug)]
pub struct StopFilter {
    stop_words: Arc<HashSet<String>>,
}

impl StopFilter {
    /// Create a new stop filter with the default English stop words.
    pub fn new() -> Self {
        Self::with_stop_words(DEFAULT_ENGLISH_STOP_WORDS_SET.clone())
    }

    /// Create a new stop filter with custom stop words.
    pub fn with_stop_words(stop_words: HashSet<String>) -> Self {
        StopFilter {
            stop_words: Arc::new(stop_words),
        }
    }

    /// Create a new stop filter from a list of stop words.
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_stop_words(words.into_iter().map(|s| s.into()).collect())
    }

    /// Check if a word is a stop word.
    pub fn is_stop_word(&self, word: &str) -> bool {
        self.stop_words.contains(word)
    }

    /// Get the number of stop words.
    pub fn len(&self) -> usize {
        self.stop_words.len()
    }

    /// Check if the stop word set is empty.
    pub fn is_empty(&self) -> bool {
        self.stop_words.is_empty()
    }
}

impl Default for StopFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter for StopFilter {
    fn filter(&self, tokens: TokenStream) -> Result<TokenStream> {
        let stop_words = Arc::clone(&self.stop_words);
        Ok(Box::new(
            tokens.filter(move |token| !stop_words.contains(&token.text)),
        ))
    }

    fn name(&self) -> &'static str {
        "stop"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::token::Token;

    #[test]
    fn test_default_stop_words() {
        let filter = StopFilter::new();
        assert_eq!(filter.len(), 33);
        assert!(filter.is_stop_word("the"));
        assert!(!filter.is_stop_word("hello"));
    }

    #[test]
    fn test_custom_stop_words() {
        let filter = StopFilter::from_words(vec!["foo", "bar"]);
        let tokens = vec![
            Token::new("foo", 0),
            Token::new("baz", 1),
            Token::new("bar", 2),
        ];

        let result: Vec<Token> = filter
            .filter(Box::new(tokens.into_iter()))
            .unwrap()
            .collect();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].text, "baz");
    }

    #[test]
    fn test_empty_filter_keeps_everything() {
        let filter = StopFilter::with_stop_words(HashSet::new());
        assert!(filter.is_empty());
        let tokens = vec![Token::new("the", 0)];
        assert_eq!(filter.filter(Box::new(tokens.into_iter())).unwrap().count(), 1);
    }
}
