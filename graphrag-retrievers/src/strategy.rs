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

//! Closed set of retrieval strategies behind one `search` entry point

use crate::graph::GraphExpansionRetriever;
use crate::text2cypher::QueryTranslator;
use crate::vector::{validate_top_k, VectorRetriever};
use graphrag_core::{keys, CallContext, Params, RagError, RagResult, RetrieverResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// `top_k` used when neither the call nor the config sets one
pub const DEFAULT_TOP_K: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Vector,
    Graph,
    #[serde(rename = "text2query")]
    Text2Query,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Vector => "vector",
            StrategyKind::Graph => "graph",
            StrategyKind::Text2Query => "text2query",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "vector" => Ok(StrategyKind::Vector),
            "graph" => Ok(StrategyKind::Graph),
            "text2query" | "text2cypher" => Ok(StrategyKind::Text2Query),
            other => Err(RagError::InvalidArgument(format!(
                "unknown strategy '{}', expected vector, graph or text2query",
                other
            ))),
        }
    }
}

/// Per-request retriever settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    pub top_k: Option<i64>,
    /// Vector strategy only
    pub return_properties: Option<Vec<String>>,
    /// Graph strategy only; overrides the template bound at construction
    pub traversal_query: Option<String>,
    /// Graph strategy only; bound as store parameters
    pub query_params: Params,
}

impl RetrieverConfig {
    pub fn top_k(mut self, top_k: i64) -> Self {
        self.top_k = Some(top_k);
        self
    }

    /// Validated `top_k`, falling back to [`DEFAULT_TOP_K`]
    pub fn resolved_top_k(&self) -> RagResult<usize> {
        validate_top_k(self.top_k.unwrap_or(DEFAULT_TOP_K))
    }
}

/// One retriever variant, chosen at construction
pub enum Retriever {
    Vector(VectorRetriever),
    Graph(GraphExpansionRetriever),
    Text2Query(QueryTranslator),
}

impl Retriever {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Retriever::Vector(_) => StrategyKind::Vector,
            Retriever::Graph(_) => StrategyKind::Graph,
            Retriever::Text2Query(_) => StrategyKind::Text2Query,
        }
    }

    /// Run the bound strategy. The result metadata names the strategy.
    ///
    /// `top_k` bounds the item count for every strategy. The text-to-query
    /// strategy also honors its own `max_rows`.
    pub async fn search(
        &self,
        query_text: &str,
        config: &RetrieverConfig,
        ctx: &CallContext,
    ) -> RagResult<RetrieverResult> {
        let top_k = config.resolved_top_k()?;
        let result = match self {
            Retriever::Vector(r) => {
                r.search(query_text, top_k, config.return_properties.as_deref(), ctx)
                    .await?
            }
            Retriever::Graph(r) => {
                r.search(
                    query_text,
                    top_k,
                    config.traversal_query.as_deref(),
                    &config.query_params,
                    ctx,
                )
                .await?
            }
            Retriever::Text2Query(r) => r.search_with_limit(query_text, Some(top_k), ctx).await?,
        };
        Ok(result.with_metadata(keys::STRATEGY, self.kind().as_str()))
    }
}

impl From<VectorRetriever> for Retriever {
    fn from(r: VectorRetriever) -> Self {
        Retriever::Vector(r)
    }
}

impl From<GraphExpansionRetriever> for Retriever {
    fn from(r: GraphExpansionRetriever) -> Self {
        Retriever::Graph(r)
    }
}

impl From<QueryTranslator> for Retriever {
    fn from(r: QueryTranslator) -> Self {
        Retriever::Text2Query(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_names() {
        assert_eq!("vector".parse::<StrategyKind>().unwrap(), StrategyKind::Vector);
        assert_eq!("Text2Query".parse::<StrategyKind>().unwrap(), StrategyKind::Text2Query);
        assert!("hybrid".parse::<StrategyKind>().is_err());
        assert_eq!(
            serde_json::to_string(&StrategyKind::Text2Query).unwrap(),
            "\"text2query\""
        );
    }

    #[test]
    fn test_retriever_config_from_json() {
        let config: RetrieverConfig = serde_json::from_value(serde_json::json!({
            "top_k": 3,
            "query_params": {"minRating": 4}
        }))
        .unwrap();
        assert_eq!(config.resolved_top_k().unwrap(), 3);
        assert_eq!(config.query_params["minRating"], serde_json::json!(4));
        assert!(config.return_properties.is_none());

        assert_eq!(RetrieverConfig::default().resolved_top_k().unwrap(), 5);
        assert!(RetrieverConfig::default().top_k(0).resolved_top_k().is_err());
    }
}
