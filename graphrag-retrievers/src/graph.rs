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

//! Vector search followed by caller-defined graph traversal
//!
//! The traversal template runs in the same statement as the vector stage and
//! sees two variables: `node` (the matched node) and `score` (its similarity).
//! It must project the final fields itself, and may re-order rows by any
//! derived aggregate. Rows come back in the template's order.
//!
//! ```text
//! CALL db.index.vector.queryNodes($index_name, $top_k, $query_vector) YIELD node, score
//! WITH node, score
//! <traversal template>
//! ```
//!
//! Templates are opaque: they are not checked against the schema, so a broken
//! template surfaces as a syntax error on first execution. Caller values are
//! bound as parameters, never spliced into the template text.

use crate::vector::{VectorIndexConfig, VectorStage, RESERVED_PARAMS, VECTOR_SEARCH};
use graphrag_core::{
    CallContext, Embedder, Params, QueryStore, RagError, RagResult, Record, RetrievedItem,
    RetrieverResult,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Template used when the caller does not supply one
pub const DEFAULT_TRAVERSAL: &str = "RETURN node, score";

/// Columns lifted into `RetrievedItem::score` when the template projects them
const SCORE_COLUMNS: [&str; 2] = ["score", "similarityScore"];

/// Vector search plus graph enrichment of each candidate
pub struct GraphExpansionRetriever {
    store: Arc<dyn QueryStore>,
    stage: VectorStage,
    traversal_query: String,
}

impl GraphExpansionRetriever {
    pub fn new(
        store: Arc<dyn QueryStore>,
        embedder: Arc<dyn Embedder>,
        index: VectorIndexConfig,
        traversal_query: impl Into<String>,
    ) -> Self {
        let traversal_query = traversal_query.into();
        let traversal_query = if traversal_query.trim().is_empty() {
            DEFAULT_TRAVERSAL.to_string()
        } else {
            traversal_query
        };
        Self {
            store,
            stage: VectorStage { embedder, index },
            traversal_query,
        }
    }

    pub fn traversal_query(&self) -> &str {
        &self.traversal_query
    }

    pub fn index(&self) -> &VectorIndexConfig {
        &self.stage.index
    }

    /// Find `top_k` candidates and expand them with a traversal template.
    ///
    /// `traversal_query` overrides the template bound at construction.
    /// `query_params` are bound alongside the vector-stage parameters and may
    /// not reuse their names.
    #[tracing::instrument(
        skip(self, query_text, traversal_query, query_params, ctx),
        fields(index = %self.stage.index.name)
    )]
    pub async fn search(
        &self,
        query_text: &str,
        top_k: usize,
        traversal_query: Option<&str>,
        query_params: &Params,
        ctx: &CallContext,
    ) -> RagResult<RetrieverResult> {
        self.stage.check_request(query_text, top_k)?;
        let template = match traversal_query {
            Some(t) if !t.trim().is_empty() => t,
            _ => self.traversal_query.as_str(),
        };
        if let Some(name) = query_params
            .keys()
            .find(|k| RESERVED_PARAMS.contains(&k.as_str()))
        {
            return Err(RagError::InvalidArgument(format!(
                "query parameter '{}' is reserved for the vector stage",
                name
            )));
        }

        let mut params = self.stage.params(query_text, top_k, ctx).await?;
        params.extend(query_params.iter().map(|(k, v)| (k.clone(), v.clone())));

        let query = format!("{}\nWITH node, score\n{}", VECTOR_SEARCH, template);
        let rows = ctx
            .guard(self.store.run(&query, &params, ctx))
            .await?
            .map_err(|e| {
                if self.stage.blames_index(&e) {
                    self.stage.index_failure(e)
                } else {
                    RagError::from(e)
                }
            })?;

        let total = rows.len();
        // The template owns ordering; only the cardinality bound is applied here
        let items: Vec<RetrievedItem> = rows.into_iter().take(top_k).map(row_to_item).collect();
        debug!(rows = total, items = items.len(), "Graph expansion complete");

        Ok(RetrieverResult::new(items))
    }
}

fn row_to_item(row: Record) -> RetrievedItem {
    let score = SCORE_COLUMNS
        .iter()
        .find_map(|col| row.get(col).and_then(Value::as_f64));
    let item = RetrievedItem::structured(row);
    match score {
        Some(score) => item.with_score(score),
        None => item,
    }
}
