//! Tokenizers split raw text into tokens.
//!
//! # Examples
//!
//! ```
//! use pagedex::analysis::tokenizer::Tokenizer;
//! use pagedex::analysis::tokenizer::regex::RegexTokenizer;
//!
//! let tokenizer = RegexTokenizer::new().unwrap();
//! let tokens: Vec<_> = tokenizer.tokenize("Hello, world!").unwrap().collect();
//! assert_eq!(tokens.len(), 2);
//! ```

use crate::analysis::token::TokenStream;
use crate::error::Result;

/// Trait for tokenizers that convert text into tokens.
pub trait Tokenizer: Send + Sync {
    /// Tokenize the given text into a stream of tokens.
    fn tokenize(&self, text: &str) -> Result<TokenStream>;

    /// Get the name of this tokenizer (for debugging and logging).
    fn name(&self) -> &'static str;
}

pub mod regex;

pub use self::regex::RegexTokenizer;
