//! WordNet prolog synonym syntax.
//!
//! ```text
//! s(100000001,1,'woods',n,1,0).
//! s(100000001,2,'wood',n,1,0).
//! s(100000001,3,'forest',n,1,0).
//! s(100000002,1,'o''clock',r,1,0).
//! ```
//!
//! Consecutive records sharing a synset id form one equivalence group. A
//! doubled quote inside the word is an escaped quote.

use crate::error::{Result, SynonymError};
use crate::synonym::rule::SynonymRule;

/// Synset id, 1-based line of its first record, member words.
type Synset = (String, usize, Vec<String>);

/// Parse `text`, one outcome per synset or per malformed record.
pub fn parse(text: &str) -> Vec<Result<SynonymRule>> {
    let mut outcomes = Vec::new();
    let mut current: Option<Synset> = None;

    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (synset, word) = match parse_record(line, line_no) {
            Ok(record) => record,
            Err(e) => {
                outcomes.push(Err(e));
                continue;
            }
        };

        let same_synset = matches!(&current, Some((id, _, _)) if *id == synset);
        if same_synset {
            if let Some((_, _, words)) = current.as_mut() {
                words.push(word);
            }
        } else if let Some(done) = current.replace((synset, line_no, vec![word])) {
            outcomes.push(Ok(into_rule(done)));
        }
    }

    if let Some(done) = current {
        outcomes.push(Ok(into_rule(done)));
    }
    outcomes
}

fn into_rule((_, line, words): Synset) -> SynonymRule {
    SynonymRule::equivalent(words, line)
}

/// Extract `(synset id, word)` from one `s(...)` record.
fn parse_record(line: &str, line_no: usize) -> Result<(String, String)> {
    let invalid = || SynonymError::parse(line_no, format!("invalid wordnet record '{line}'"));

    let body = line
        .strip_prefix("s(")
        .map(|rest| rest.strip_suffix('.').unwrap_or(rest))
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(invalid)?;

    let (synset, _) = body.split_once(',').ok_or_else(invalid)?;
    if synset.is_empty() || !synset.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let start = body.find('\'').ok_or_else(invalid)? + 1;
    let end = body.rfind('\'').ok_or_else(invalid)?;
    if end < start {
        return Err(invalid());
    }

    let word = body[start..end].replace("''", "'");
    if word.trim().is_empty() {
        return Err(invalid());
    }

    Ok((synset.to_string(), word))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "s(100000001,1,'woods',n,1,0).\n\
                          s(100000001,2,'wood',n,1,0).\n\
                          s(100000001,3,'forest',n,1,0).\n\
                          \n\
                          s(100000002,1,'o''clock',r,1,0).\n";

    #[test]
    fn test_groups_by_synset() {
        let rules: Vec<SynonymRule> = parse(SAMPLE).into_iter().map(|r| r.unwrap()).collect();

        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].inputs, vec!["woods", "wood", "forest"]);
        assert_eq!(rules[0].line, 1);
        assert!(!rules[0].directional);
        assert_eq!(rules[1].inputs, vec!["o'clock"]);
        assert_eq!(rules[1].line, 5);
    }

    #[test]
    fn test_malformed_record() {
        let outcomes = parse("s(100000001,1,'woods',n,1,0).\nnot a record\n");

        assert_eq!(outcomes.len(), 2);
        assert!(matches!(
            outcomes[0],
            Err(SynonymError::Parse { line: 2, .. })
        ));
        assert!(outcomes[1].is_ok());
    }

    #[test]
    fn test_missing_quotes() {
        assert!(parse_record("s(1,1,woods,n,1,0).", 1).is_err());
        assert!(parse_record("s(1,1,'woods,n,1,0).", 1).is_err());
        assert!(parse_record("s(x,1,'woods',n,1,0).", 1).is_err());
    }
}
