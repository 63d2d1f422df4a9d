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

//! Vector similarity retrieval
//!
//! Embeds the query text once, runs one nearest-neighbour query against a
//! named vector index and projects each hit to the requested properties.
//!
//! ```rust,ignore
//! let retriever = VectorRetriever::new(store, embedder, VectorIndexConfig::new("moviePlots"))
//!     .return_properties(["title", "plot"]);
//! let result = retriever.search("Toys coming alive", 5, None, &CallContext::new()).await?;
//! for item in &result.items {
//!     println!("{} {:?}", item, item.score);
//! }
//! ```

use graphrag_core::{
    keys, CallContext, Embedder, Params, QueryStore, RagError, RagResult, Record,
    RetrievedItem, RetrieverResult, StoreError,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// Nearest-neighbour stage shared by the vector and graph-expansion retrievers.
/// Yields `node` and `score`.
pub(crate) const VECTOR_SEARCH: &str =
    "CALL db.index.vector.queryNodes($index_name, $top_k, $query_vector) YIELD node, score";

/// Parameter names owned by the vector stage
pub(crate) const RESERVED_PARAMS: [&str; 3] = ["index_name", "top_k", "query_vector"];

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Vector index the retriever searches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndexConfig {
    /// Name of the store-side vector index
    pub name: String,

    /// Largest `top_k` the index accepts
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Node property holding the embedding; never projected back
    #[serde(default = "default_embedding_property")]
    pub embedding_property: String,
}

fn default_capacity() -> usize {
    1000
}

fn default_embedding_property() -> String {
    "embedding".to_string()
}

impl VectorIndexConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capacity: default_capacity(),
            embedding_property: default_embedding_property(),
        }
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn embedding_property(mut self, property: impl Into<String>) -> Self {
        self.embedding_property = property.into();
        self
    }
}

/// Embedding half of a vector search, reused by graph expansion
pub(crate) struct VectorStage {
    pub(crate) embedder: Arc<dyn Embedder>,
    pub(crate) index: VectorIndexConfig,
}

impl VectorStage {
    /// Reject bad input before any collaborator is contacted
    pub(crate) fn check_request(&self, query_text: &str, top_k: usize) -> RagResult<()> {
        if query_text.trim().is_empty() {
            return Err(RagError::InvalidArgument(
                "query text must not be empty".to_string(),
            ));
        }
        if top_k == 0 {
            return Err(RagError::InvalidArgument(
                "top_k must be a positive integer".to_string(),
            ));
        }
        if top_k > self.index.capacity {
            return Err(RagError::InvalidArgument(format!(
                "top_k {} exceeds the capacity {} of index '{}'",
                top_k, self.index.capacity, self.index.name
            )));
        }
        Ok(())
    }

    /// Store failure of the vector query itself. Outages stay connection errors.
    pub(crate) fn index_failure(&self, error: StoreError) -> RagError {
        match error {
            StoreError::Connection(msg) => RagError::Connection(msg),
            other => RagError::RetrievalFailure(format!(
                "vector index '{}' query failed: {}",
                self.index.name, other
            )),
        }
    }

    /// Whether a store error points at the vector index rather than
    /// whatever statement was appended to the vector query
    pub(crate) fn blames_index(&self, error: &StoreError) -> bool {
        let message = match error {
            StoreError::Syntax { message, .. } | StoreError::Runtime { message, .. } => message,
            StoreError::Connection(_) => return false,
        };
        let lower = message.to_lowercase();
        lower.contains("db.index.vector")
            || lower.contains("vector schema index")
            || lower.contains("vector index")
            || message.contains(&self.index.name)
    }

    /// Embed the query and build the parameters for [`VECTOR_SEARCH`]
    pub(crate) async fn params(
        &self,
        query_text: &str,
        top_k: usize,
        ctx: &CallContext,
    ) -> RagResult<Params> {
        let vector = ctx
            .guard(self.embedder.embed(query_text, ctx))
            .await?
            .map_err(RagError::from)?;
        if vector.is_empty() {
            return Err(RagError::RetrievalFailure(format!(
                "embedder '{}' returned an empty vector",
                self.embedder.model_name()
            )));
        }
        debug!(
            model = self.embedder.model_name(),
            dimensions = vector.len(),
            "Embedded query text"
        );

        let mut params = Params::new();
        params.insert("index_name".to_string(), json!(self.index.name));
        params.insert("top_k".to_string(), json!(top_k as u64));
        params.insert("query_vector".to_string(), json!(vector));
        Ok(params)
    }
}

/// Convert a caller-facing `top_k` into a validated count
pub fn validate_top_k(top_k: i64) -> RagResult<usize> {
    if top_k <= 0 {
        return Err(RagError::InvalidArgument(format!(
            "top_k must be a positive integer, got {}",
            top_k
        )));
    }
    Ok(top_k as usize)
}

/// Check that a property name can be placed in a projection verbatim
pub fn validate_property_name(name: &str) -> RagResult<()> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(RagError::InvalidArgument(format!(
            "'{}' is not a valid property name",
            name
        )))
    }
}

/// Similarity search over a named vector index
pub struct VectorRetriever {
    store: Arc<dyn QueryStore>,
    stage: VectorStage,
    return_properties: Option<Vec<String>>,
}

impl VectorRetriever {
    pub fn new(
        store: Arc<dyn QueryStore>,
        embedder: Arc<dyn Embedder>,
        index: VectorIndexConfig,
    ) -> Self {
        Self {
            store,
            stage: VectorStage { embedder, index },
            return_properties: None,
        }
    }

    /// Default properties to project when a search does not name any
    pub fn return_properties<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.return_properties = Some(properties.into_iter().map(Into::into).collect());
        self
    }

    pub fn index(&self) -> &VectorIndexConfig {
        &self.stage.index
    }

    /// Return the `top_k` nearest nodes, highest score first.
    ///
    /// `return_properties` overrides the retriever default; `None` on both
    /// projects every stored property except the embedding.
    #[tracing::instrument(skip(self, query_text, ctx), fields(index = %self.stage.index.name))]
    pub async fn search(
        &self,
        query_text: &str,
        top_k: usize,
        return_properties: Option<&[String]>,
        ctx: &CallContext,
    ) -> RagResult<RetrieverResult> {
        self.stage.check_request(query_text, top_k)?;
        let properties = return_properties.or(self.return_properties.as_deref());
        if let Some(properties) = properties {
            for name in properties {
                validate_property_name(name)?;
            }
        }

        let query = format!(
            "{}\n{}",
            VECTOR_SEARCH,
            self.projection(properties)
        );
        let params = self.stage.params(query_text, top_k, ctx).await?;

        let rows = ctx
            .guard(self.store.run(&query, &params, ctx))
            .await?
            .map_err(|e| self.stage.index_failure(e))?;

        let mut items = rows
            .into_iter()
            .map(|row| hit_to_item(row, properties))
            .collect::<RagResult<Vec<_>>>()?;

        // Stable: equal scores keep the index's order
        items.sort_by(|a, b| {
            let (a, b) = (a.score.unwrap_or(f64::MIN), b.score.unwrap_or(f64::MIN));
            b.partial_cmp(&a).unwrap_or(std::cmp::Ordering::Equal)
        });
        items.truncate(top_k);

        debug!(items = items.len(), "Vector search complete");
        Ok(RetrieverResult::new(items))
    }

    fn projection(&self, properties: Option<&[String]>) -> String {
        let node = match properties {
            Some(properties) => {
                let fields = properties
                    .iter()
                    .map(|p| format!(".{}", p))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("node {{{}}}", fields)
            }
            None => format!(
                "node {{.*, `{}`: null}}",
                self.stage.index.embedding_property.replace('`', "")
            ),
        };
        format!(
            "RETURN {} AS node, labels(node) AS nodeLabels, elementId(node) AS id, score",
            node
        )
    }
}

/// Turn one `node, nodeLabels, id, score` row into an item
fn hit_to_item(row: Record, properties: Option<&[String]>) -> RagResult<RetrievedItem> {
    let score = row
        .get("score")
        .and_then(Value::as_f64)
        .ok_or_else(|| {
            RagError::RetrievalFailure("vector search row without a numeric score".to_string())
        })?;

    let node = match row.get("node") {
        Some(Value::Object(map)) => map,
        _ => {
            return Err(RagError::RetrievalFailure(
                "vector search row without a node projection".to_string(),
            ))
        }
    };

    let record = match properties {
        Some(properties) => Record::from_pairs(
            properties
                .iter()
                .map(|p| (p.clone(), node.get(p).cloned().unwrap_or(Value::Null))),
        ),
        None => Record::from_pairs(
            node.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), v.clone())),
        ),
    };

    let mut item = RetrievedItem::structured(record).with_score(score);
    if let Some(id) = row.get("id").and_then(Value::as_str) {
        item = item.with_metadata(keys::ID, id);
    }
    if let Some(Value::Array(labels)) = row.get("nodeLabels") {
        let labels = labels
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(",");
        item = item.with_metadata(keys::NODE_LABELS, labels);
    }
    Ok(item)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_top_k() {
        assert!(matches!(validate_top_k(0), Err(RagError::InvalidArgument(_))));
        assert!(matches!(validate_top_k(-3), Err(RagError::InvalidArgument(_))));
        assert_eq!(validate_top_k(5).unwrap(), 5);
    }

    #[test]
    fn test_property_names_are_identifiers() {
        assert!(validate_property_name("title").is_ok());
        assert!(validate_property_name("_plot2").is_ok());
        assert!(validate_property_name("title} RETURN 1 //").is_err());
        assert!(validate_property_name("2title").is_err());
        assert!(validate_property_name("").is_err());
    }

    #[test]
    fn test_hit_projection_follows_requested_order() {
        let row = Record::from_pairs([
            ("node", json!({"plot": "Toys come alive", "title": "Toy Story"})),
            ("nodeLabels", json!(["Movie"])),
            ("id", json!("4:abc:1")),
            ("score", json!(0.93)),
        ]);
        let props = vec!["title".to_string(), "plot".to_string(), "year".to_string()];
        let item = hit_to_item(row, Some(&props)).unwrap();

        let record = item.record().unwrap();
        assert_eq!(record.keys(), ["title", "plot", "year"]);
        assert_eq!(record.get("year"), Some(&Value::Null));
        assert_eq!(item.score, Some(0.93));
        assert_eq!(item.metadata[keys::NODE_LABELS].as_str(), Some("Movie"));
        assert_eq!(item.metadata[keys::ID].as_str(), Some("4:abc:1"));
    }

    #[test]
    fn test_hit_without_score_is_a_failure() {
        let row = Record::from_pairs([("node", json!({"title": "Heat"}))]);
        assert!(matches!(
            hit_to_item(row, None),
            Err(RagError::RetrievalFailure(_))
        ));
    }
}
