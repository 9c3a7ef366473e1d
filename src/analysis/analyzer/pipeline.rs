//! A tokenizer followed by filters, applied in insertion order.
//!
//! ```
//! use std::sync::Arc;
//! use dynamic_synonym::analysis::analyzer::{Analyzer, PipelineAnalyzer};
//! use dynamic_synonym::analysis::token_filter::LowercaseFilter;
//! use dynamic_synonym::analysis::tokenizer::WhitespaceTokenizer;
//!
//! let rules = PipelineAnalyzer::new(Arc::new(WhitespaceTokenizer::new()))
//!     .add_filter(Arc::new(LowercaseFilter::new()))
//!     .with_name("synonyms_rules");
//!
//! let words: Vec<_> = rules.analyze("New York").unwrap().map(|t| t.text).collect();
//! assert_eq!(words, vec!["new", "york"]);
//! ```

use std::fmt;
use std::sync::Arc;

use crate::analysis::analyzer::Analyzer;
use crate::analysis::token::TokenStream;
use crate::analysis::token_filter::Filter;
use crate::analysis::tokenizer::Tokenizer;
use crate::error::Result;

#[derive(Clone)]
pub struct PipelineAnalyzer {
    name: String,
    tokenizer: Arc<dyn Tokenizer>,
    filters: Vec<Arc<dyn Filter>>,
}

impl PipelineAnalyzer {
    /// Named after the tokenizer until [`PipelineAnalyzer::with_name`].
    pub fn new(tokenizer: Arc<dyn Tokenizer>) -> Self {
        PipelineAnalyzer {
            name: tokenizer.name().to_string(),
            tokenizer,
            filters: Vec::new(),
        }
    }

    pub fn add_filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    pub fn filters(&self) -> &[Arc<dyn Filter>] {
        &self.filters
    }
}

impl Analyzer for PipelineAnalyzer {
    fn analyze(&self, text: &str) -> Result<TokenStream> {
        self.filters
            .iter()
            .try_fold(self.tokenizer.tokenize(text)?, |tokens, filter| {
                filter.filter(tokens)
            })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for PipelineAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let filters: Vec<&str> = self.filters.iter().map(|filter| filter.name()).collect();
        f.debug_struct("PipelineAnalyzer")
            .field("name", &self.name)
            .field("tokenizer", &self.tokenizer.name())
            .field("filters", &filters)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::token_filter::LowercaseFilter;
    use crate::analysis::tokenizer::WhitespaceTokenizer;

    #[test]
    fn test_filters_run_in_order() {
        let analyzer = PipelineAnalyzer::new(Arc::new(WhitespaceTokenizer::new()))
            .add_filter(Arc::new(LowercaseFilter::new()));

        let words: Vec<String> = analyzer
            .analyze("Coca COLA")
            .unwrap()
            .map(|t| t.text)
            .collect();
        assert_eq!(words, vec!["coca", "cola"]);
        assert_eq!(analyzer.name(), "whitespace");
        assert!(format!("{analyzer:?}").contains("lowercase"));
    }
}
