//! Text analysis module.
//!
//! This module provides the analysis chain the synonym filter plugs into:
//! tokens, tokenizers, token filters and analyzers. The same chain (minus any
//! synonym filter) is used to analyze the terms of every synonym rule.

pub mod analyzer;
pub mod token;
pub mod token_filter;
pub mod tokenizer;
