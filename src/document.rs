//! The document type stored and returned by the index.
//!
//! Documents carry a single unstructured text field. The text is analyzed at
//! indexing time and stored verbatim in the segment's document store.
//!
//! # Examples
//!
//! ```
//! use pagedex::document::Document;
//!
//! let doc = Document::new("The quick brown fox");
//! assert_eq!(doc.text(), "The quick brown fox");
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// A raw document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Document {
    text: String,
}

impl Document {
    /// Create a document from its text.
    pub fn new<S: Into<String>>(text: S) -> Self {
        Document { text: text.into() }
    }

    /// The document text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Consume the document and return its text.
    pub fn into_text(self) -> String {
        self.text
    }

    /// First line of the text, commonly used as an external identifier.
    pub fn first_line(&self) -> &str {
        self.text.lines().next().unwrap_or("")
    }
}

impl From<&str> for Document {
    fn from(text: &str) -> Self {
        Document::new(text)
    }
}

impl From<String> for Document {
    fn from(text: String) -> Self {
        Document::new(text)
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_line() {
        let doc = Document::new("42\nhttp://example.com\nbody text");
        assert_eq!(doc.first_line(), "42");
        assert_eq!(Document::new("").first_line(), "");
    }
}
