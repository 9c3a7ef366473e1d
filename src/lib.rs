//! # Dynamic Synonym
//!
//! A synonym token filter whose rules are reloaded from an external source
//! while the analysis pipeline keeps running.
//!
//! ## Features
//!
//! - Rules from a local file, an HTTP(S) document, or a relational table
//! - Solr and WordNet rule syntax
//! - One background poller per pipeline, shared by all its synonym filters
//! - Lock-free hot swap of the compiled map to every live filter

pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod factory;
pub mod reload;
pub mod source;
pub mod synonym;

pub mod prelude {
    pub use crate::config::SynonymSettings;
    pub use crate::error::{Result, SynonymError};
    pub use crate::factory::{ChainAwareSynonymFilterFactory, SynonymFilterFactory};
    pub use crate::reload::{ReloadService, ReloadServiceConfig};
    pub use crate::synonym::{RuleDialect, SynonymMap};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
