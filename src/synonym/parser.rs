//! Rule text grammars.
//!
//! Two textual dialects are supported, selected by the `format` setting:
//!
//! - [`RuleDialect::Solr`] - one rule per line, `a, b, c` equivalence groups
//!   and `a, b => c` explicit mappings, `#` comments
//! - [`RuleDialect::WordNet`] - Prolog-style `s(...)` sense records, grouped
//!   by synset id
//!
//! Each dialect reports one result per rule so that lenient parsing can drop
//! a malformed line and keep going.

use std::fmt;
use std::str::FromStr;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SynonymError};
use crate::synonym::rule::SynonymRule;

pub mod solr;
pub mod wordnet;

/// Textual grammar the rules are written in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleDialect {
    /// Solr line syntax.
    #[default]
    Solr,
    /// WordNet prolog syntax.
    WordNet,
}

impl RuleDialect {
    /// Resolve the `format` setting.
    ///
    /// `wordnet` (any case) selects WordNet; the empty string and `solr`
    /// select Solr. Unknown values fall back to Solr with a warning.
    pub fn from_format(format: &str) -> Self {
        match format.parse() {
            Ok(dialect) => dialect,
            Err(_) => {
                warn!("unknown synonym format '{format}', falling back to solr");
                RuleDialect::Solr
            }
        }
    }
}

impl FromStr for RuleDialect {
    type Err = SynonymError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "solr" => Ok(RuleDialect::Solr),
            "wordnet" => Ok(RuleDialect::WordNet),
            other => Err(SynonymError::config(format!(
                "unknown synonym format '{other}'"
            ))),
        }
    }
}

impl fmt::Display for RuleDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleDialect::Solr => write!(f, "solr"),
            RuleDialect::WordNet => write!(f, "wordnet"),
        }
    }
}

/// Parse rule text in the given dialect.
///
/// With `lenient` unset the first malformed rule aborts parsing. With
/// `lenient` set malformed rules are logged and skipped.
pub fn parse(text: &str, dialect: RuleDialect, lenient: bool) -> Result<Vec<SynonymRule>> {
    let outcomes = match dialect {
        RuleDialect::Solr => solr::parse(text),
        RuleDialect::WordNet => wordnet::parse(text),
    };

    let mut rules = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        match outcome {
            Ok(rule) => rules.push(rule),
            Err(e) if lenient => warn!("skipping invalid {dialect} synonym rule: {e}"),
            Err(e) => return Err(e),
        }
    }

    Ok(rules)
}
