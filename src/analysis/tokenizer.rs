//! Tokenizers split raw text into the first token stream of a chain.
//!
//! Rule terms go through the same tokenizer as the text they are matched
//! against.
//!
//! ```
//! use dynamic_synonym::analysis::tokenizer::{Tokenizer, WhitespaceTokenizer};
//!
//! let words: Vec<_> = WhitespaceTokenizer::new()
//!     .tokenize("new york")
//!     .unwrap()
//!     .map(|t| t.text)
//!     .collect();
//! assert_eq!(words, vec!["new", "york"]);
//! ```

use crate::analysis::token::TokenStream;
use crate::error::Result;

/// Shared between request threads and reload workers, hence `Send + Sync`.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Result<TokenStream>;

    fn name(&self) -> &'static str;
}

pub mod whitespace;

pub use whitespace::WhitespaceTokenizer;
