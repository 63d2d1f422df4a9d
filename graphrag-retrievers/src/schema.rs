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

//! Graph schema descriptions used to condition query generation
//!
//! A schema is either hand-written text or a structured description. Both
//! render to the same layout:
//!
//! ```text
//! Node properties:
//! Person {name: STRING, born: INTEGER}
//! Movie {tagline: STRING, title: STRING, released: INTEGER}
//!
//! Relationship properties:
//! ACTED_IN {role: STRING}
//!
//! The relationships:
//! (:Person)-[:ACTED_IN]->(:Movie)
//! ```

use graphrag_core::{CallContext, Params, QueryStore, RagError, RagResult, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::info;

const NODE_PROPERTIES_QUERY: &str = "CALL db.schema.nodeTypeProperties() \
     YIELD nodeLabels, propertyName, propertyTypes \
     RETURN nodeLabels, propertyName, propertyTypes";

const REL_PROPERTIES_QUERY: &str = "CALL db.schema.relTypeProperties() \
     YIELD relType, propertyName, propertyTypes \
     RETURN relType, propertyName, propertyTypes";

/// Sampled, so introspection stays bounded on large graphs
const RELATIONSHIPS_QUERY: &str = "MATCH (a)-[r]->(b) \
     WITH a, r, b LIMIT 10000 \
     RETURN DISTINCT labels(a)[0] AS start, type(r) AS type, labels(b)[0] AS end \
     ORDER BY start, type, end";

/// Immutable description of labels, properties and relationship patterns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaDescriptor {
    /// Hand-written schema text, used verbatim
    Text { text: String },
    /// Structured schema, rendered on use
    Structured(GraphSchema),
}

/// Structured graph schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSchema {
    #[serde(default)]
    pub nodes: Vec<LabelProperties>,
    #[serde(default)]
    pub relationship_properties: Vec<LabelProperties>,
    #[serde(default)]
    pub relationships: Vec<RelationshipPattern>,
}

/// Properties declared for one node label or relationship type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelProperties {
    pub label: String,
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDef {
    pub name: String,
    /// Store type name, e.g. `STRING`, `INTEGER`
    #[serde(rename = "type")]
    pub kind: String,
}

/// `(:start)-[:rel_type]->(:end)`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationshipPattern {
    pub start: String,
    pub rel_type: String,
    pub end: String,
}

impl LabelProperties {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            properties: Vec::new(),
        }
    }

    pub fn property(mut self, name: impl Into<String>, kind: impl Into<String>) -> Self {
        self.properties.push(PropertyDef {
            name: name.into(),
            kind: kind.into(),
        });
        self
    }
}

impl RelationshipPattern {
    pub fn new(start: impl Into<String>, rel_type: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            rel_type: rel_type.into(),
            end: end.into(),
        }
    }
}

impl fmt::Display for GraphSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Node properties:")?;
        for node in &self.nodes {
            writeln!(f, "{}", node)?;
        }
        writeln!(f)?;
        writeln!(f, "Relationship properties:")?;
        for rel in &self.relationship_properties {
            writeln!(f, "{}", rel)?;
        }
        writeln!(f)?;
        write!(f, "The relationships:")?;
        for pattern in &self.relationships {
            write!(
                f,
                "\n(:{})-[:{}]->(:{})",
                pattern.start, pattern.rel_type, pattern.end
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for LabelProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let props = self
            .properties
            .iter()
            .map(|p| format!("{}: {}", p.name, p.kind))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{} {{{}}}", self.label, props)
    }
}

impl SchemaDescriptor {
    pub fn text(text: impl Into<String>) -> Self {
        SchemaDescriptor::Text { text: text.into() }
    }

    /// Text handed to the query generator
    pub fn render(&self) -> String {
        match self {
            SchemaDescriptor::Text { text } => text.trim().to_string(),
            SchemaDescriptor::Structured(schema) => schema.to_string(),
        }
    }

    /// Read the schema from the store once.
    ///
    /// Vector-valued properties are skipped: they are embeddings and only add
    /// noise to generation prompts.
    pub async fn introspect(store: &dyn QueryStore, ctx: &CallContext) -> RagResult<Self> {
        let params = Params::new();
        let node_rows = run(store, NODE_PROPERTIES_QUERY, &params, ctx).await?;
        let rel_rows = run(store, REL_PROPERTIES_QUERY, &params, ctx).await?;
        let pattern_rows = run(store, RELATIONSHIPS_QUERY, &params, ctx).await?;

        let mut nodes: BTreeMap<String, Vec<PropertyDef>> = BTreeMap::new();
        for row in &node_rows {
            let labels = string_list(row.get("nodeLabels"));
            let Some(label) = labels.first() else { continue };
            let entry = nodes.entry(label.clone()).or_default();
            if let Some(prop) = property_def(row) {
                entry.push(prop);
            }
        }

        let mut rels: BTreeMap<String, Vec<PropertyDef>> = BTreeMap::new();
        for row in &rel_rows {
            let Some(rel_type) = row.get("relType").and_then(Value::as_str) else { continue };
            let rel_type = rel_type.trim_start_matches(':').replace('`', "");
            if let Some(prop) = property_def(row) {
                rels.entry(rel_type).or_default().push(prop);
            }
        }

        let mut relationships = BTreeSet::new();
        for row in &pattern_rows {
            let field = |name: &str| row.get(name).and_then(Value::as_str).map(str::to_string);
            if let (Some(start), Some(rel_type), Some(end)) =
                (field("start"), field("type"), field("end"))
            {
                relationships.insert(RelationshipPattern::new(start, rel_type, end));
            }
        }

        let schema = GraphSchema {
            nodes: nodes
                .into_iter()
                .map(|(label, properties)| LabelProperties { label, properties })
                .collect(),
            relationship_properties: rels
                .into_iter()
                .map(|(label, properties)| LabelProperties { label, properties })
                .collect(),
            relationships: relationships.into_iter().collect(),
        };
        info!(
            labels = schema.nodes.len(),
            relationship_types = schema.relationship_properties.len(),
            patterns = schema.relationships.len(),
            "Introspected graph schema"
        );
        Ok(SchemaDescriptor::Structured(schema))
    }
}

impl From<GraphSchema> for SchemaDescriptor {
    fn from(schema: GraphSchema) -> Self {
        SchemaDescriptor::Structured(schema)
    }
}

async fn run(
    store: &dyn QueryStore,
    query: &str,
    params: &Params,
    ctx: &CallContext,
) -> RagResult<Vec<Record>> {
    ctx.guard(store.run(query, params, ctx))
        .await?
        .map_err(RagError::from)
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn property_def(row: &Record) -> Option<PropertyDef> {
    let name = row.get("propertyName").and_then(Value::as_str)?;
    let types = string_list(row.get("propertyTypes"));
    let kind = types.first().map(String::as_str).unwrap_or("ANY");
    if kind.ends_with("Array") && kind.starts_with("Float") || kind == "LIST<FLOAT>" {
        return None;
    }
    Some(PropertyDef {
        name: name.to_string(),
        kind: normalize_type(kind),
    })
}

/// Map procedure type names (`String`, `Long`) onto Cypher type names
fn normalize_type(kind: &str) -> String {
    match kind {
        "String" => "STRING".to_string(),
        "Long" | "Integer" => "INTEGER".to_string(),
        "Double" | "Float" => "FLOAT".to_string(),
        "Boolean" => "BOOLEAN".to_string(),
        "Date" => "DATE".to_string(),
        "DateTime" => "DATE_TIME".to_string(),
        "Point" => "POINT".to_string(),
        "StringArray" => "LIST".to_string(),
        other => other.to_uppercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie_schema() -> GraphSchema {
        GraphSchema {
            nodes: vec![
                LabelProperties::new("Person")
                    .property("name", "STRING")
                    .property("born", "INTEGER"),
                LabelProperties::new("Movie").property("title", "STRING"),
            ],
            relationship_properties: vec![LabelProperties::new("ACTED_IN").property("role", "STRING")],
            relationships: vec![RelationshipPattern::new("Person", "ACTED_IN", "Movie")],
        }
    }

    #[test]
    fn test_structured_schema_renders_text_layout() {
        let rendered = SchemaDescriptor::from(movie_schema()).render();
        assert_eq!(
            rendered,
            "Node properties:\n\
             Person {name: STRING, born: INTEGER}\n\
             Movie {title: STRING}\n\
             \n\
             Relationship properties:\n\
             ACTED_IN {role: STRING}\n\
             \n\
             The relationships:\n\
             (:Person)-[:ACTED_IN]->(:Movie)"
        );
    }

    #[test]
    fn test_text_schema_is_trimmed() {
        let schema = SchemaDescriptor::text("\nNode properties:\nGenre {name: STRING}\n");
        assert_eq!(schema.render(), "Node properties:\nGenre {name: STRING}");
    }

    #[test]
    fn test_type_normalization() {
        assert_eq!(normalize_type("String"), "STRING");
        assert_eq!(normalize_type("Long"), "INTEGER");
        assert_eq!(normalize_type("Duration"), "DURATION");
    }

    #[test]
    fn test_embedding_properties_skipped() {
        let row = Record::from_pairs([
            ("nodeLabels", serde_json::json!(["Movie"])),
            ("propertyName", serde_json::json!("plotEmbedding")),
            ("propertyTypes", serde_json::json!(["FloatArray"])),
        ]);
        assert!(property_def(&row).is_none());
    }
}
