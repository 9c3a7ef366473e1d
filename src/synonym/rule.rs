//! Parsed synonym rules.

/// One rule parsed from a line (Solr) or a synset (WordNet) of rule text.
///
/// Terms are kept as written; they are analyzed into token sequences when
/// the rule is compiled into a [`SynonymMap`](super::map::SynonymMap).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SynonymRule {
    /// Terms that trigger the rule.
    pub inputs: Vec<String>,

    /// Terms the inputs are rewritten to.
    pub outputs: Vec<String>,

    /// `true` for an explicit `a => b` mapping, `false` for an equivalence
    /// group whose expansion depends on the `expand` build flag.
    pub directional: bool,

    /// 1-based line the rule was read from.
    pub line: usize,
}

impl SynonymRule {
    /// An explicit mapping: every input is replaced by every output.
    pub fn directional(inputs: Vec<String>, outputs: Vec<String>, line: usize) -> Self {
        SynonymRule {
            inputs,
            outputs,
            directional: true,
            line,
        }
    }

    /// A group of interchangeable terms.
    pub fn equivalent(terms: Vec<String>, line: usize) -> Self {
        SynonymRule {
            inputs: terms.clone(),
            outputs: terms,
            directional: false,
            line,
        }
    }
}
