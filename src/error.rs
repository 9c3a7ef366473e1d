//! Error types for the dynamic synonym library.
//!
//! All fallible operations return [`SynonymError`] through the crate-wide
//! [`Result`] alias. The variants follow the failure classes the reload
//! pipeline distinguishes between:
//!
//! - [`SynonymError::Config`] - missing or invalid settings, fatal at construction
//! - [`SynonymError::Parse`] - malformed rule text
//! - [`SynonymError::SourceUnavailable`] - the rule source could not be probed or read
//!
//! # Examples
//!
//! ```
//! use dynamic_synonym::error::{Result, SynonymError};
//!
//! fn load() -> Result<()> {
//!     Err(SynonymError::config("dynamic synonym requires `synonyms_path` or `db_url`"))
//! }
//!
//! assert!(load().unwrap_err().is_fatal());
//! ```

use std::io;

use thiserror::Error;

/// The main error type for dynamic synonym operations.
#[derive(Error, Debug)]
pub enum SynonymError {
    /// I/O errors (file operations, network, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Missing or invalid filter settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed rule text
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// The rule source could not be probed or read
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// Analysis-related errors (tokenization, filtering, etc.)
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Background task join errors
    #[error("Thread join error: {0}")]
    ThreadJoinError(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for operations that may fail with SynonymError.
pub type Result<T> = std::result::Result<T, SynonymError>;

impl SynonymError {
    /// Create a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        SynonymError::Config(msg.into())
    }

    /// Create a new parse error for the given 1-based line number.
    pub fn parse<S: Into<String>>(line: usize, msg: S) -> Self {
        SynonymError::Parse {
            line,
            message: msg.into(),
        }
    }

    /// Create a new source unavailable error.
    pub fn source_unavailable<S: Into<String>>(msg: S) -> Self {
        SynonymError::SourceUnavailable(msg.into())
    }

    /// Create a new analysis error.
    pub fn analysis<S: Into<String>>(msg: S) -> Self {
        SynonymError::Analysis(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        SynonymError::Other(msg.into())
    }

    /// Whether this error must abort pipeline construction.
    ///
    /// Source failures are retried on the next poll; everything else means
    /// the settings or the rules themselves are wrong.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SynonymError::SourceUnavailable(_) | SynonymError::Io(_))
    }
}
