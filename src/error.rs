//! Error types for the pagedex library.
//!
//! All fallible operations return [`Result`], whose error side is the
//! [`PagedexError`] enum. Callers can tell capability mismatches
//! ([`PagedexError::UnsupportedOperation`]) apart from bad arguments
//! ([`PagedexError::Precondition`]) and from storage faults.
//!
//! # Examples
//!
//! ```
//! use pagedex::error::{PagedexError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(PagedexError::precondition("segment count must be even"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for pagedex operations.
#[derive(Error, Debug)]
pub enum PagedexError {
    /// I/O errors on the underlying page files or document stores.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A required argument was missing or invalid, or an operation was
    /// invoked in a state that forbids it.
    #[error("Precondition violated: {0}")]
    Precondition(String),

    /// The operation needs a capability this index was not created with.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Storage-related errors (missing pages, failed renames, ...).
    #[error("Storage error: {0}")]
    Storage(String),

    /// A segment file does not match the expected binary layout.
    #[error("Segment error: {0}")]
    Segment(String),

    /// Analysis-related errors (tokenization, filtering, etc.).
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Invalid index configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Binary serialization errors.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with PagedexError.
pub type Result<T> = std::result::Result<T, PagedexError>;

impl PagedexError {
    /// Create a new precondition error.
    pub fn precondition<S: Into<String>>(msg: S) -> Self {
        PagedexError::Precondition(msg.into())
    }

    /// Create a new unsupported-operation error.
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        PagedexError::UnsupportedOperation(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        PagedexError::Storage(msg.into())
    }

    /// Create a new segment layout error.
    pub fn segment<S: Into<String>>(msg: S) -> Self {
        PagedexError::Segment(msg.into())
    }

    /// Create a new analysis error.
    pub fn analysis<S: Into<String>>(msg: S) -> Self {
        PagedexError::Analysis(msg.into())
    }

    /// Create a new invalid config error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        PagedexError::InvalidConfig(msg.into())
    }

    /// Create a new serialization error.
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        PagedexError::Serialization(msg.into())
    }

    /// Whether this error signals a capability mismatch rather than a fault.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, PagedexError::UnsupportedOperation(_))
    }
}

impl From<bincode::Error> for PagedexError {
    fn from(err: bincode::Error) -> Self {
        PagedexError::Serialization(err.to_string())
    }
}
