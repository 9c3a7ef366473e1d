//! Solr synonym line syntax.
//!
//! ```text
//! # comment
//! big, large, huge            equivalence group
//! ny, nyc => new york         explicit mapping
//! a\,b, c                     backslash escapes the next character
//! ```

use crate::error::{Result, SynonymError};
use crate::synonym::rule::SynonymRule;

const MAPPING: &str = "=>";
const TERM_SEPARATOR: &str = ",";

/// Parse every line of `text`, one outcome per non-blank, non-comment line.
pub fn parse(text: &str) -> Vec<Result<SynonymRule>> {
    text.lines()
        .enumerate()
        .filter_map(|(index, line)| parse_line(line, index + 1).transpose())
        .collect()
}

/// Parse a single line. Blank lines and comments yield `Ok(None)`.
pub fn parse_line(line: &str, line_no: usize) -> Result<Option<SynonymRule>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (sides, mappings) = split(line, MAPPING);
    if mappings > 0 {
        if mappings != 1 || sides.len() != 2 {
            return Err(SynonymError::parse(
                line_no,
                format!("expected exactly one '{MAPPING}' mapping in '{line}'"),
            ));
        }
        let inputs = terms(&sides[0], line_no)?;
        let outputs = terms(&sides[1], line_no)?;
        Ok(Some(SynonymRule::directional(inputs, outputs, line_no)))
    } else {
        Ok(Some(SynonymRule::equivalent(terms(line, line_no)?, line_no)))
    }
}

fn terms(side: &str, line_no: usize) -> Result<Vec<String>> {
    let mut terms = Vec::new();
    for piece in split(side, TERM_SEPARATOR).0 {
        let term = unescape(&piece);
        let term = term.trim();
        if term.is_empty() {
            return Err(SynonymError::parse(line_no, "empty synonym term"));
        }
        terms.push(term.to_string());
    }

    if terms.is_empty() {
        return Err(SynonymError::parse(line_no, "synonym rule has no terms"));
    }
    Ok(terms)
}

/// Split on `separator`, honouring backslash escapes. Escapes are kept in
/// the pieces and removed by [`unescape`]. Also returns how many unescaped
/// separators were seen.
fn split(s: &str, separator: &str) -> (Vec<String>, usize) {
    let mut parts = Vec::new();
    let mut separators = 0;
    let mut current = String::new();
    let mut rest = s;

    while let Some(ch) = rest.chars().next() {
        if rest.starts_with(separator) {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
            rest = &rest[separator.len()..];
            separators += 1;
            continue;
        }

        rest = &rest[ch.len_utf8()..];
        current.push(ch);
        if ch == '\\'
            && let Some(next) = rest.chars().next()
        {
            current.push(next);
            rest = &rest[next.len_utf8()..];
        }
    }

    if !current.is_empty() {
        parts.push(current);
    }
    (parts, separators)
}

fn unescape(s: &str) -> String {
    if !s.contains('\\') {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(ch);
        }
    }
    out
}
