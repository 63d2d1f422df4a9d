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

//! Data model shared by retrievers, the context assembler and the orchestrator

use crate::error::RagError;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Query parameters bound by the store, never interpolated into query text
pub type Params = BTreeMap<String, Value>;

/// Well-known metadata keys
pub mod keys {
    /// Accepted structured query (text-to-query)
    pub const CYPHER: &str = "cypher";
    /// Generation attempts used by the translator
    pub const ATTEMPTS: &str = "attempts";
    /// Retrieval strategy that produced the result
    pub const STRATEGY: &str = "strategy";
    /// Set when store rows were dropped to honor a row bound
    pub const ROWS_TRUNCATED: &str = "rows_truncated";
    /// Store-side identifier of the matched node
    pub const ID: &str = "id";
    /// Labels of the matched node, comma separated
    pub const NODE_LABELS: &str = "nodeLabels";
}

/// One row returned by the store, with the column order preserved
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    keys: Vec<String>,
    values: Vec<Value>,
}

impl Record {
    /// Build a record from `(column, value)` pairs
    pub fn from_pairs<K, I>(pairs: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let mut record = Record::default();
        for (key, value) in pairs {
            record.keys.push(key.into());
            record.values.push(value);
        }
        record
    }

    /// Zip a column header with one row; `None` when their lengths differ
    pub fn from_columns(columns: &[String], row: Vec<Value>) -> Option<Self> {
        if columns.len() != row.len() {
            return None;
        }
        Some(Self {
            keys: columns.to_vec(),
            values: row,
        })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.keys
            .iter()
            .position(|k| k == key)
            .map(|idx| &self.values[idx])
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.keys
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Record")?;
        for (key, value) in self.iter() {
            match value {
                Value::String(s) => write!(f, " {}='{}'", key, s)?,
                other => write!(f, " {}={}", key, other)?,
            }
        }
        write!(f, ">")
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RecordVisitor;

        impl<'de> Visitor<'de> for RecordVisitor {
            type Value = Record;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of column names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Record, A::Error> {
                let mut record = Record::default();
                while let Some((key, value)) = access.next_entry::<String, Value>()? {
                    record.keys.push(key);
                    record.values.push(value);
                }
                Ok(record)
            }
        }

        deserializer.deserialize_map(RecordVisitor)
    }
}

/// Scalar metadata value attached to a retrieved item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Convert a JSON value; arrays and objects are not scalars
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Scalar::Null),
            Value::Bool(b) => Some(Scalar::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(Scalar::Int)
                .or_else(|| n.as_f64().map(Scalar::Float)),
            Value::String(s) => Some(Scalar::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

/// Content of a retrieved item: free text or a structured store row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemContent {
    Text(String),
    Structured(Record),
}

/// One piece of evidence produced by a retriever
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedItem {
    pub content: ItemContent,
    #[serde(default)]
    pub metadata: BTreeMap<String, Scalar>,
    /// Similarity score; only set by similarity-based retrieval
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl RetrievedItem {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: ItemContent::Text(content.into()),
            metadata: BTreeMap::new(),
            score: None,
        }
    }

    pub fn structured(record: Record) -> Self {
        Self {
            content: ItemContent::Structured(record),
            metadata: BTreeMap::new(),
            score: None,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The structured row, if this item holds one
    pub fn record(&self) -> Option<&Record> {
        match &self.content {
            ItemContent::Structured(record) => Some(record),
            ItemContent::Text(_) => None,
        }
    }
}

impl fmt::Display for RetrievedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.content {
            ItemContent::Text(text) => write!(f, "{}", text),
            ItemContent::Structured(record) => write!(f, "{}", record),
        }
    }
}

/// Ordered items plus a provenance side channel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrieverResult {
    pub items: Vec<RetrievedItem>,
    /// Always present, possibly empty
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl RetrieverResult {
    pub fn new(items: Vec<RetrievedItem>) -> Self {
        Self {
            items,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The generated structured query, when the text-to-query strategy produced this result
    pub fn generated_query(&self) -> Option<&str> {
        self.metadata.get(keys::CYPHER).and_then(Value::as_str)
    }
}

/// How much of the retrieved evidence reached the prompt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextReport {
    /// Evidence entries included in the prompt
    pub included: usize,
    /// Evidence entries dropped to honor the budget
    pub dropped: usize,
    /// Size of the included evidence, in the assembler's unit
    pub total_size: usize,
    pub budget: Option<usize>,
}

impl ContextReport {
    pub fn is_truncated(&self) -> bool {
        self.dropped > 0
    }
}

/// Final answer, optionally with the evidence it was grounded on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub answer: String,
    /// Present only when the caller asked for context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retriever_result: Option<RetrieverResult>,
    #[serde(default)]
    pub context: ContextReport,
}

/// Worked (input phrase, target query) pair used to bias query generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    pub input: String,
    pub query: String,
}

impl Example {
    pub fn new(input: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            query: query.into(),
        }
    }
}

impl fmt::Display for Example {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "USER INPUT: '{}' QUERY: {}", self.input, self.query)
    }
}

impl FromStr for Example {
    type Err = RagError;

    /// Parses `USER INPUT: '<phrase>' QUERY: <query>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .trim()
            .strip_prefix("USER INPUT:")
            .ok_or_else(|| RagError::InvalidArgument(format!("missing 'USER INPUT:' in example: {}", s)))?;
        let (input, query) = rest
            .split_once("QUERY:")
            .ok_or_else(|| RagError::InvalidArgument(format!("missing 'QUERY:' in example: {}", s)))?;

        let input = input.trim().trim_matches(|c| c == '\'' || c == '"').trim();
        let query = query.trim();
        if input.is_empty() || query.is_empty() {
            return Err(RagError::InvalidArgument(format!(
                "example needs both an input and a query: {}",
                s
            )));
        }
        Ok(Example::new(input, query))
    }
}

/// A candidate query produced by the translator for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedQuery {
    pub text: String,
    pub is_validated: bool,
    /// 1-based generation attempt that produced this text
    pub attempt: u32,
}

impl GeneratedQuery {
    pub fn new(text: impl Into<String>, attempt: u32) -> Self {
        Self {
            text: text.into(),
            is_validated: false,
            attempt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_preserves_column_order() {
        let record = Record::from_pairs([
            ("title", json!("The Matrix")),
            ("released", json!(1999)),
            ("genres", json!(["Action", "Sci-Fi"])),
        ]);

        assert_eq!(record.keys(), ["title", "released", "genres"]);
        assert_eq!(record.get("released"), Some(&json!(1999)));
        assert_eq!(
            record.to_string(),
            "<Record title='The Matrix' released=1999 genres=[\"Action\",\"Sci-Fi\"]>"
        );

        let encoded = serde_json::to_string(&record).unwrap();
        assert_eq!(
            encoded,
            r#"{"title":"The Matrix","released":1999,"genres":["Action","Sci-Fi"]}"#
        );
        let decoded: Record = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_record_from_columns_rejects_mismatch() {
        let columns = vec!["a".to_string(), "b".to_string()];
        assert!(Record::from_columns(&columns, vec![json!(1)]).is_none());
        assert!(Record::from_columns(&columns, vec![json!(1), json!(2)]).is_some());
    }

    #[test]
    fn test_example_parses_script_form() {
        let example: Example = "USER INPUT: 'Get user ratings for a movie?' QUERY: MATCH (u:User)-[r:RATED]->(m:Movie) WHERE m.title = 'Movie Title' RETURN r.rating"
            .parse()
            .unwrap();
        assert_eq!(example.input, "Get user ratings for a movie?");
        assert!(example.query.starts_with("MATCH (u:User)"));
        assert!(example.query.ends_with("RETURN r.rating"));

        assert!("QUERY: MATCH (n) RETURN n".parse::<Example>().is_err());
        assert!("USER INPUT: 'x'".parse::<Example>().is_err());
    }

    #[test]
    fn test_scalar_from_json() {
        assert_eq!(Scalar::from_json(&json!(3)), Some(Scalar::Int(3)));
        assert_eq!(Scalar::from_json(&json!(0.5)), Some(Scalar::Float(0.5)));
        assert_eq!(Scalar::from_json(&json!([1])), None);
    }

    #[test]
    fn test_result_metadata_always_serialized() {
        let result = RetrieverResult::new(vec![]);
        let encoded = serde_json::to_value(&result).unwrap();
        assert_eq!(encoded["metadata"], json!({}));
        assert!(result.generated_query().is_none());

        let result = result.with_metadata(keys::CYPHER, "MATCH (n) RETURN n");
        assert_eq!(result.generated_query(), Some("MATCH (n) RETURN n"));
    }
}
