//! Token filters and the factory seam a host pipeline calls.
//!
//! - [`LowercaseFilter`] - case folding ahead of synonym matching
//! - [`DynamicSynonymFilter`] - synonym expansion from a hot-reloaded map
//!
//! ```text
//! whitespace → lowercase → dynamic_synonym
//! ```

use crate::analysis::token::TokenStream;
use crate::error::Result;

/// A long-lived member of an analyzer chain.
pub trait Filter: Send + Sync {
    fn filter(&self, tokens: TokenStream) -> Result<TokenStream>;

    /// Stable identifier, also used to leave synonym filters out of the chain
    /// that analyzes rule terms.
    fn name(&self) -> &'static str;
}

/// Creates one filter instance per token stream a host opens.
pub trait TokenFilterFactory: Send + Sync {
    /// The configured filter name.
    fn name(&self) -> &str;

    fn create(&self, tokens: TokenStream) -> TokenStream;
}

pub mod dynamic_synonym;
pub mod lowercase;

pub use dynamic_synonym::{DynamicSynonymFilter, SynonymTokenStream};
pub use lowercase::LowercaseFilter;
