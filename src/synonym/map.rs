//! Compiled synonym map.
//!
//! Uses an FST (Finite State Transducer) keyed by the analyzed input phrase,
//! whose value indexes the list of output token sequences. A map is built
//! once per reload and never mutated afterwards; a reload replaces it
//! wholesale.

use std::collections::BTreeMap;
use std::fmt;

use fst::Map;

use crate::error::{Result, SynonymError};

/// Separator between the words of a multi-word key.
pub const WORD_SEPARATOR: char = '\u{0}';

/// What a matched input phrase expands to.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SynonymEntry {
    /// Whether the matched tokens are emitted alongside the outputs.
    pub keep_original: bool,

    /// Output token sequences, in rule order, excluding the input itself.
    pub outputs: Vec<Vec<String>>,
}

/// Immutable compiled synonym structure supporting longest-match lookup.
///
/// An empty map is valid and means "no expansion configured".
#[derive(Clone, Default)]
pub struct SynonymMap {
    fst: Option<Map<Vec<u8>>>,
    entries: Vec<SynonymEntry>,
    max_input_length: usize,
}

impl SynonymMap {
    /// A map with no rules.
    pub fn empty() -> Self {
        SynonymMap::default()
    }

    /// Whether the map holds no rules.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct input phrases.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Longest input phrase, in tokens.
    pub fn max_input_length(&self) -> usize {
        self.max_input_length
    }

    /// Exact lookup of an analyzed phrase.
    pub fn get<S: AsRef<str>>(&self, phrase: &[S]) -> Option<&SynonymEntry> {
        let fst = self.fst.as_ref()?;
        let index = fst.get(join_key(phrase))? as usize;
        self.entries.get(index)
    }

    /// Longest match at the head of `tokens`.
    ///
    /// Returns the number of tokens consumed and the matched entry.
    pub fn longest_match<S: AsRef<str>>(&self, tokens: &[S]) -> Option<(usize, &SynonymEntry)> {
        let max_len = tokens.len().min(self.max_input_length);
        (1..=max_len)
            .rev()
            .find_map(|len| self.get(&tokens[..len]).map(|entry| (len, entry)))
    }

    /// Synonyms of a whitespace-separated phrase, each joined with a space.
    ///
    /// The phrase itself is never part of the result.
    pub fn synonyms_of(&self, phrase: &str) -> Vec<String> {
        let words: Vec<&str> = phrase.split_whitespace().collect();
        self.get(&words)
            .map(|entry| entry.outputs.iter().map(|output| output.join(" ")).collect())
            .unwrap_or_default()
    }
}

impl fmt::Debug for SynonymMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynonymMap")
            .field("entries", &self.entries.len())
            .field("max_input_length", &self.max_input_length)
            .finish()
    }
}

fn join_key<S: AsRef<str>>(words: &[S]) -> String {
    let mut key = String::new();
    for (i, word) in words.iter().enumerate() {
        if i > 0 {
            key.push(WORD_SEPARATOR);
        }
        key.push_str(word.as_ref());
    }
    key
}

/// Accumulates analyzed `input → output` pairs and compiles them.
#[derive(Debug, Default)]
pub(crate) struct EntryCollector {
    entries: BTreeMap<String, (usize, SynonymEntry)>,
}

impl EntryCollector {
    pub(crate) fn new() -> Self {
        EntryCollector::default()
    }

    /// Record that `input` rewrites to `output`.
    ///
    /// Mapping a phrase to itself marks the original as kept.
    pub(crate) fn add(&mut self, input: &[String], output: &[String]) {
        let (_, entry) = self
            .entries
            .entry(join_key(input))
            .or_insert_with(|| (input.len(), SynonymEntry::default()));

        if input == output {
            entry.keep_original = true;
        } else if !entry.outputs.iter().any(|existing| existing == output) {
            entry.outputs.push(output.to_vec());
        }
    }

    /// Compile into an FST-backed map. Identity-only entries are dropped.
    pub(crate) fn finish(self) -> Result<SynonymMap> {
        let kept: Vec<(String, usize, SynonymEntry)> = self
            .entries
            .into_iter()
            .filter(|(_, (_, entry))| !entry.outputs.is_empty())
            .map(|(key, (len, entry))| (key, len, entry))
            .collect();

        if kept.is_empty() {
            return Ok(SynonymMap::empty());
        }

        let fst = Map::from_iter(
            kept.iter()
                .enumerate()
                .map(|(index, (key, _, _))| (key.as_bytes(), index as u64)),
        )
        .map_err(|e| SynonymError::other(format!("FST build error: {e}")))?;

        let max_input_length = kept.iter().map(|(_, len, _)| *len).max().unwrap_or(0);
        let entries = kept.into_iter().map(|(_, _, entry)| entry).collect();

        Ok(SynonymMap {
            fst: Some(fst),
            entries,
            max_input_length,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn test_empty_map() {
        let map = SynonymMap::empty();
        assert!(map.is_empty());
        assert_eq!(map.len(), 0);
        assert!(map.longest_match(&["big"]).is_none());
        assert!(map.synonyms_of("big").is_empty());
    }

    #[test]
    fn test_collector_keeps_original_and_dedups() {
        let mut collector = EntryCollector::new();
        collector.add(&words("big"), &words("big"));
        collector.add(&words("big"), &words("large"));
        collector.add(&words("big"), &words("large"));

        let map = collector.finish().unwrap();
        let entry = map.get(&["big"]).unwrap();
        assert!(entry.keep_original);
        assert_eq!(entry.outputs, vec![words("large")]);
    }

    #[test]
    fn test_identity_only_entries_are_dropped() {
        let mut collector = EntryCollector::new();
        collector.add(&words("big"), &words("big"));

        assert!(collector.finish().unwrap().is_empty());
    }

    #[test]
    fn test_longest_match_prefers_longer_phrase() {
        let mut collector = EntryCollector::new();
        collector.add(&words("new"), &words("novel"));
        collector.add(&words("new york"), &words("nyc"));

        let map = collector.finish().unwrap();
        assert_eq!(map.max_input_length(), 2);

        let (len, entry) = map.longest_match(&["new", "york", "city"]).unwrap();
        assert_eq!(len, 2);
        assert_eq!(entry.outputs, vec![words("nyc")]);

        let (len, _) = map.longest_match(&["new", "jersey"]).unwrap();
        assert_eq!(len, 1);
        assert_eq!(map.synonyms_of("new york"), vec!["nyc"]);
    }
}
