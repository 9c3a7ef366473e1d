//! Synonym filter backed by a hot-swappable map.
//!
//! The filter never owns its rules. It reads whatever [`SynonymMap`] its
//! [`MapSlot`] currently holds, and a reload swaps the slot's content without
//! touching streams in flight. The snapshot is loaded once per input
//! position, so a swap becomes visible at the next position.
//!
//! Matching is greedy longest match. Matched tokens are replaced by the
//! rule's outputs stacked on the same position; equivalence groups built
//! with `expand` keep the original tokens as well.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use dynamic_synonym::analysis::analyzer::{Analyzer, PipelineAnalyzer};
//! use dynamic_synonym::analysis::token_filter::{DynamicSynonymFilter, Filter};
//! use dynamic_synonym::analysis::tokenizer::WhitespaceTokenizer;
//! use dynamic_synonym::synonym::{RuleDialect, build};
//!
//! let rules = PipelineAnalyzer::new(Arc::new(WhitespaceTokenizer::new()));
//! let map = build("big, large", RuleDialect::Solr, true, false, &rules).unwrap();
//!
//! let filter = DynamicSynonymFilter::new(map);
//! let tokens: Vec<_> = filter
//!     .filter(rules.analyze("a big dog").unwrap())
//!     .unwrap()
//!     .map(|t| (t.text, t.position_increment))
//!     .collect();
//!
//! assert_eq!(
//!     tokens,
//!     vec![
//!         ("a".to_string(), 1),
//!         ("big".to_string(), 1),
//!         ("large".to_string(), 0),
//!         ("dog".to_string(), 1),
//!     ]
//! );
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::analysis::token::{Token, TokenKind, TokenStream};
use crate::analysis::token_filter::Filter;
use crate::error::Result;
use crate::synonym::map::{SynonymEntry, SynonymMap};
use crate::synonym::registry::{ConsumerHandle, MapSlot, PublishedSynonyms};

/// Long-lived synonym filter for use inside an analyzer chain.
pub struct DynamicSynonymFilter {
    slot: MapSlot,
    _registration: Option<ConsumerHandle>,
}

impl DynamicSynonymFilter {
    /// Name reported by [`Filter::name`].
    pub const NAME: &'static str = "dynamic_synonym";

    /// A filter over a fixed map, not registered anywhere.
    pub fn new(map: SynonymMap) -> Self {
        DynamicSynonymFilter {
            slot: Arc::new(ArcSwap::from_pointee(map)),
            _registration: None,
        }
    }

    /// A filter that receives every map published to `published`.
    pub fn attached(published: &Arc<PublishedSynonyms>) -> Self {
        let (slot, registration) = published.attach();
        DynamicSynonymFilter {
            slot,
            _registration: Some(registration),
        }
    }

    /// Replace the map this filter reads.
    pub fn update(&self, map: Arc<SynonymMap>) {
        self.slot.store(map);
    }

    /// The map this filter currently reads.
    pub fn current_map(&self) -> Arc<SynonymMap> {
        self.slot.load_full()
    }
}

impl Filter for DynamicSynonymFilter {
    fn filter(&self, tokens: TokenStream) -> Result<TokenStream> {
        if self.slot.load().is_empty() {
            return Ok(tokens);
        }
        Ok(Box::new(SynonymTokenStream::new(
            tokens,
            Arc::clone(&self.slot),
        )))
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}

impl std::fmt::Debug for DynamicSynonymFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicSynonymFilter")
            .field("map", &self.slot.load_full())
            .field("registered", &self._registration.is_some())
            .finish()
    }
}

/// Token stream applying the map held by a slot.
///
/// A stream created by a factory owns its registration, so the registry
/// entry lives exactly as long as the stream.
pub struct SynonymTokenStream {
    input: TokenStream,
    slot: MapSlot,
    _registration: Option<ConsumerHandle>,
    lookahead: VecDeque<Token>,
    pending: VecDeque<Token>,
    input_done: bool,
}

impl SynonymTokenStream {
    pub fn new(input: TokenStream, slot: MapSlot) -> Self {
        SynonymTokenStream {
            input,
            slot,
            _registration: None,
            lookahead: VecDeque::new(),
            pending: VecDeque::new(),
            input_done: false,
        }
    }

    /// Tie a registry entry to the lifetime of this stream.
    pub fn with_registration(mut self, registration: ConsumerHandle) -> Self {
        self._registration = Some(registration);
        self
    }

    fn fill(&mut self, wanted: usize) {
        while !self.input_done && self.lookahead.len() < wanted {
            match self.input.next() {
                Some(token) => self.lookahead.push_back(token),
                None => self.input_done = true,
            }
        }
    }

    fn emit(&mut self, matched: &[Token], entry: &SynonymEntry) {
        let first = &matched[0];
        let last = &matched[matched.len() - 1];
        let mut last_position: Option<usize> = None;

        if entry.keep_original {
            for token in matched {
                last_position = Some(token.position);
                self.pending.push_back(token.clone());
            }
        }

        for output in &entry.outputs {
            for (i, word) in output.iter().enumerate() {
                let position = first.position + i;
                let increment = match last_position {
                    Some(previous) => position.saturating_sub(previous),
                    None => first.position_increment,
                };
                let length = if output.len() == 1 { matched.len() } else { 1 };

                let token = Token::with_offsets(
                    word.as_str(),
                    position,
                    first.start_offset,
                    last.end_offset,
                )
                .with_kind(TokenKind::Synonym)
                .with_position_increment(increment)
                .with_position_length(length);

                last_position = Some(position);
                self.pending.push_back(token);
            }
        }
    }
}

impl Iterator for SynonymTokenStream {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if let Some(token) = self.pending.pop_front() {
            return Some(token);
        }

        let map = self.slot.load_full();
        if map.is_empty() {
            return self.lookahead.pop_front().or_else(|| self.input.next());
        }

        self.fill(map.max_input_length());
        let matched = {
            let words: Vec<&str> = self.lookahead.iter().map(|t| t.text.as_str()).collect();
            map.longest_match(&words)
        };

        match matched {
            Some((len, entry)) => {
                let tokens: Vec<Token> = self.lookahead.drain(..len).collect();
                self.emit(&tokens, entry);
                self.pending.pop_front()
            }
            None => self.lookahead.pop_front(),
        }
    }
}
