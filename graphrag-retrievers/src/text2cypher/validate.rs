// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Shape checks for generated Cypher
//!
//! This is not a parser. It catches the failure modes language models actually
//! produce (prose instead of a query, a missing RETURN, a cut-off completion,
//! a write clause) before the text reaches the store. Anything subtler is left
//! to the store, whose error feeds the repair loop.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static FENCED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[A-Za-z]*[ \t]*\r?\n(.*?)```").expect("valid fence regex")
});

static LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(cypher|query)\s*:\s*").expect("valid label regex"));

static WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("valid word regex"));

const READ_CLAUSES: [&str; 5] = ["MATCH", "WITH", "UNWIND", "CALL", "RETURN"];

static PROCEDURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s+([A-Za-z_][A-Za-z0-9_]*(?:\s*\.\s*[A-Za-z_][A-Za-z0-9_]*)*)")
        .expect("valid procedure regex")
});

/// Procedures a read-only query may call, lowercased
const READ_PROCEDURES: [&str; 10] = [
    "db.index.vector.querynodes",
    "db.index.vector.queryrelationships",
    "db.index.fulltext.querynodes",
    "db.index.fulltext.queryrelationships",
    "db.schema.nodetypeproperties",
    "db.schema.reltypeproperties",
    "db.schema.visualization",
    "db.labels",
    "db.relationshiptypes",
    "db.propertykeys",
];

const WRITE_CLAUSES: [&str; 8] = [
    "CREATE", "MERGE", "DELETE", "DETACH", "SET", "REMOVE", "DROP", "FOREACH",
];

/// Why a generated query was rejected before execution
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("the response is empty")]
    Empty,

    #[error("expected the query to start with a read clause, found '{0}'")]
    NotAQuery(String),

    #[error("the query has no RETURN clause")]
    MissingReturn,

    #[error("unbalanced '{0}'")]
    Unbalanced(char),

    #[error("unterminated string literal or comment")]
    Unterminated,

    #[error("write clause '{0}' is not allowed")]
    WriteClause(String),

    #[error("procedure '{0}' is not allowed in a read-only query")]
    Procedure(String),
}

/// Strip the wrapping models put around a query.
///
/// Handles Markdown fences, a leading `cypher:` / `query:` label and a
/// trailing semicolon.
pub fn clean(raw: &str) -> String {
    let mut text = raw.trim();
    if let Some(inner) = FENCED.captures(text).and_then(|c| c.get(1)) {
        text = inner.as_str().trim();
    } else {
        text = text.trim_matches('`').trim();
    }
    if let Some(label) = LABEL.find(text) {
        text = text[label.end()..].trim();
    }
    text.trim_end_matches(|c: char| c == ';' || c.is_whitespace())
        .to_string()
}

/// Check that `query` looks like a single read query
pub fn validate(query: &str, allow_writes: bool) -> Result<(), ValidationError> {
    if query.trim().is_empty() {
        return Err(ValidationError::Empty);
    }

    let skeleton = skeleton(query)?;
    let words = words(&skeleton);

    let first = words.first().map(|w| w.text.to_uppercase()).unwrap_or_default();
    let starts_with_read = match first.as_str() {
        "OPTIONAL" => words
            .get(1)
            .map(|w| w.text.eq_ignore_ascii_case("MATCH"))
            .unwrap_or(false),
        other => READ_CLAUSES.contains(&other),
    };
    if !starts_with_read {
        let found = query.split_whitespace().next().unwrap_or_default();
        return Err(ValidationError::NotAQuery(found.to_string()));
    }

    let clauses: Vec<&Word> = words.iter().filter(|w| w.is_clause).collect();
    if !clauses
        .iter()
        .any(|w| w.text.eq_ignore_ascii_case("RETURN") || w.text.eq_ignore_ascii_case("YIELD"))
    {
        return Err(ValidationError::MissingReturn);
    }

    if !allow_writes {
        for (i, word) in clauses.iter().enumerate() {
            let upper = word.text.to_uppercase();
            if WRITE_CLAUSES.contains(&upper.as_str()) {
                return Err(ValidationError::WriteClause(upper));
            }
            if upper == "LOAD"
                && clauses
                    .get(i + 1)
                    .map(|next| next.text.eq_ignore_ascii_case("CSV"))
                    .unwrap_or(false)
            {
                return Err(ValidationError::WriteClause("LOAD CSV".to_string()));
            }
            if upper == "CALL" {
                check_procedure(&skeleton[word.end..])?;
            }
        }
    }

    Ok(())
}

/// `rest` follows a CALL keyword. Subqueries (`CALL {`) are checked through
/// their own clauses; named procedures must be on the read list.
fn check_procedure(rest: &str) -> Result<(), ValidationError> {
    let Some(name) = PROCEDURE.captures(rest).and_then(|c| c.get(1)) else {
        return Ok(());
    };
    let name: String = name.as_str().chars().filter(|c| !c.is_whitespace()).collect();
    if READ_PROCEDURES.contains(&name.to_lowercase().as_str()) {
        Ok(())
    } else {
        Err(ValidationError::Procedure(name))
    }
}

/// Copy of the query with string contents and comments blanked out and
/// quoted identifiers replaced by underscores. Brackets are checked on the way.
fn skeleton(query: &str) -> Result<String, ValidationError> {
    let chars: Vec<char> = query.chars().collect();
    let mut out = String::with_capacity(query.len());
    let mut closers: Vec<char> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' => {
                out.push(c);
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(ValidationError::Unterminated),
                        Some('\\') => {
                            out.push_str("  ");
                            i += 2;
                        }
                        Some(&q) if q == c => {
                            out.push(c);
                            i += 1;
                            break;
                        }
                        Some(_) => {
                            out.push(' ');
                            i += 1;
                        }
                    }
                }
            }
            '`' => {
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(ValidationError::Unterminated),
                        Some('`') => {
                            i += 1;
                            break;
                        }
                        Some(_) => {
                            out.push('_');
                            i += 1;
                        }
                    }
                }
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    out.push(' ');
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                loop {
                    match (chars.get(i), chars.get(i + 1)) {
                        (None, _) => return Err(ValidationError::Unterminated),
                        (Some('*'), Some('/')) => {
                            i += 2;
                            break;
                        }
                        _ => i += 1,
                    }
                }
                out.push(' ');
            }
            '(' | '[' | '{' => {
                closers.push(match c {
                    '(' => ')',
                    '[' => ']',
                    _ => '}',
                });
                out.push(c);
                i += 1;
            }
            ')' | ']' | '}' => {
                if closers.pop() != Some(c) {
                    return Err(ValidationError::Unbalanced(c));
                }
                out.push(c);
                i += 1;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    match closers.pop() {
        Some(closer) => Err(ValidationError::Unbalanced(opener(closer))),
        None => Ok(out),
    }
}

fn opener(closer: char) -> char {
    match closer {
        ')' => '(',
        ']' => '[',
        _ => '{',
    }
}

struct Word<'a> {
    text: &'a str,
    /// Byte offset just past the word in the skeleton
    end: usize,
    /// False for property keys, labels, parameters and map keys
    is_clause: bool,
}

fn words(skeleton: &str) -> Vec<Word<'_>> {
    WORD.find_iter(skeleton)
        .map(|m| {
            let before = skeleton[..m.start()].chars().next_back();
            let after = skeleton[m.end()..].trim_start().chars().next();
            let is_clause = !matches!(before, Some('.') | Some(':') | Some('$'))
                && after != Some(':');
            Word {
                text: m.as_str(),
                end: m.end(),
                is_clause,
            }
        })
        .collect()
}
