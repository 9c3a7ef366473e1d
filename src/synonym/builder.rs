//! Compile rule text into a [`SynonymMap`].

use std::fmt;
use std::sync::Arc;

use log::{debug, warn};

use crate::analysis::analyzer::Analyzer;
use crate::error::{Result, SynonymError};
use crate::synonym::map::{EntryCollector, SynonymMap};
use crate::synonym::parser::{self, RuleDialect};
use crate::synonym::rule::SynonymRule;

/// Rule text as read from a source, together with its dialect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawRules {
    pub text: String,
    pub dialect: RuleDialect,
}

impl RawRules {
    pub fn new<S: Into<String>>(text: S, dialect: RuleDialect) -> Self {
        RawRules {
            text: text.into(),
            dialect,
        }
    }
}

/// Parse and compile `text` into a map.
///
/// Every term is run through `analyzer` so that rule phrases line up with
/// the tokens the filter sees at runtime. A term the analyzer drops entirely
/// is an error for its rule.
///
/// With `lenient` unset the first bad rule fails the whole build; nothing
/// partial is returned.
pub fn build(
    text: &str,
    dialect: RuleDialect,
    expand: bool,
    lenient: bool,
    analyzer: &dyn Analyzer,
) -> Result<SynonymMap> {
    let rules = parser::parse(text, dialect, lenient)?;

    let mut collector = EntryCollector::new();
    for rule in &rules {
        match compile_rule(rule, expand, analyzer) {
            Ok(pairs) => {
                for (input, output) in &pairs {
                    collector.add(input, output);
                }
            }
            Err(e) if lenient => warn!("skipping synonym rule at line {}: {e}", rule.line),
            Err(e) => return Err(e),
        }
    }

    let map = collector.finish()?;
    debug!(
        "compiled {} {dialect} rules into {} synonym entries",
        rules.len(),
        map.len()
    );
    Ok(map)
}

type Phrase = Vec<String>;

fn compile_rule(
    rule: &SynonymRule,
    expand: bool,
    analyzer: &dyn Analyzer,
) -> Result<Vec<(Phrase, Phrase)>> {
    let inputs = analyze_terms(&rule.inputs, rule.line, analyzer)?;

    let mut pairs = Vec::new();
    if rule.directional {
        let outputs = analyze_terms(&rule.outputs, rule.line, analyzer)?;
        for input in &inputs {
            for output in &outputs {
                pairs.push((input.clone(), output.clone()));
            }
        }
    } else if expand {
        for input in &inputs {
            for output in &inputs {
                pairs.push((input.clone(), output.clone()));
            }
        }
    } else if let Some(first) = inputs.first() {
        for input in &inputs {
            pairs.push((input.clone(), first.clone()));
        }
    }

    Ok(pairs)
}

fn analyze_terms(terms: &[String], line: usize, analyzer: &dyn Analyzer) -> Result<Vec<Phrase>> {
    terms
        .iter()
        .map(|term| {
            let words: Phrase = analyzer
                .analyze(term)?
                .map(|token| token.text)
                .filter(|text| !text.is_empty())
                .collect();
            if words.is_empty() {
                Err(SynonymError::parse(
                    line,
                    format!("term '{term}' was completely eliminated by analysis"),
                ))
            } else {
                Ok(words)
            }
        })
        .collect()
}

/// Builds maps with fixed flags and a fixed rule analyzer.
///
/// Cloning is cheap; the analyzer is shared.
#[derive(Clone)]
pub struct MapBuilder {
    expand: bool,
    lenient: bool,
    analyzer: Arc<dyn Analyzer>,
}

impl MapBuilder {
    /// Create a builder with `expand` on and `lenient` off.
    pub fn new(analyzer: Arc<dyn Analyzer>) -> Self {
        MapBuilder {
            expand: true,
            lenient: false,
            analyzer,
        }
    }

    pub fn with_expand(mut self, expand: bool) -> Self {
        self.expand = expand;
        self
    }

    pub fn with_lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }

    pub fn expand(&self) -> bool {
        self.expand
    }

    pub fn lenient(&self) -> bool {
        self.lenient
    }

    /// Build on the calling thread.
    pub fn build(&self, rules: &RawRules) -> Result<SynonymMap> {
        build(
            &rules.text,
            rules.dialect,
            self.expand,
            self.lenient,
            self.analyzer.as_ref(),
        )
    }

    /// Build on tokio's blocking pool.
    pub async fn build_blocking(&self, rules: RawRules) -> Result<SynonymMap> {
        let builder = self.clone();
        tokio::task::spawn_blocking(move || builder.build(&rules))
            .await
            .map_err(|e| SynonymError::ThreadJoinError(e.to_string()))?
    }
}

impl fmt::Debug for MapBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapBuilder")
            .field("expand", &self.expand)
            .field("lenient", &self.lenient)
            .field("analyzer", &self.analyzer.name())
            .finish()
    }
}
