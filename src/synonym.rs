//! Synonym rules, their compiled form, and hot-swap publication.
//!
//! - [`parser`] - Solr and WordNet rule grammars
//! - [`builder`] - analyze and compile rules into a [`SynonymMap`]
//! - [`map`] - FST-backed longest-match lookup
//! - [`registry`] - publish a new map to every live filter

pub mod builder;
pub mod map;
pub mod parser;
pub mod registry;
pub mod rule;

pub use builder::{MapBuilder, RawRules, build};
pub use map::{SynonymEntry, SynonymMap};
pub use parser::RuleDialect;
pub use registry::{ConsumerHandle, ConsumerRegistry, MapSlot, PublishedSynonyms};
pub use rule::SynonymRule;
