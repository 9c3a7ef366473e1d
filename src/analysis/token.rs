//! Tokens flowing through an analysis chain.
//!
//! Synonyms are stacked on the token they expand by giving them a
//! `position_increment` of 0. A synonym that stands for several input tokens
//! covers them all through `position_length`:
//!
//! ```text
//! "new york city" with  new york => nyc
//!
//!   nyc   position 0  increment 1  length 2
//!   city  position 2  increment 1  length 1
//! ```
//!
//! ```
//! use dynamic_synonym::analysis::token::{Token, TokenKind};
//!
//! let token = Token::with_offsets("york", 1, 4, 8);
//! assert_eq!(token.kind, TokenKind::Word);
//! assert_eq!(token.end_offset - token.start_offset, 4);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// One analyzed unit of text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,

    /// Index of the token in its stream, counted in positions.
    pub position: usize,

    /// Byte range in the analyzed text.
    pub start_offset: usize,
    pub end_offset: usize,

    pub kind: TokenKind,

    /// Distance from the previous token's position; 0 stacks this token on it.
    pub position_increment: usize,

    /// Number of positions covered.
    pub position_length: usize,
}

/// Where a token came from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Produced by the tokenizer.
    #[default]
    Word,
    /// Injected by a synonym rule.
    Synonym,
}

impl Token {
    pub fn new<S: Into<String>>(text: S, position: usize) -> Self {
        Token::with_offsets(text, position, 0, 0)
    }

    pub fn with_offsets<S: Into<String>>(
        text: S,
        position: usize,
        start_offset: usize,
        end_offset: usize,
    ) -> Self {
        Token {
            text: text.into(),
            position,
            start_offset,
            end_offset,
            kind: TokenKind::Word,
            position_increment: 1,
            position_length: 1,
        }
    }

    pub fn with_kind(mut self, kind: TokenKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_position_increment(mut self, increment: usize) -> Self {
        self.position_increment = increment;
        self
    }

    pub fn with_position_length(mut self, length: usize) -> Self {
        self.position_length = length;
        self
    }

    /// Whether this token was injected by a synonym rule.
    pub fn is_synonym(&self) -> bool {
        self.kind == TokenKind::Synonym
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Boxed token iterator passed between the tokenizer and filters.
pub type TokenStream = Box<dyn Iterator<Item = Token>>;
