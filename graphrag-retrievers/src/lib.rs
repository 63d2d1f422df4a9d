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

//! GraphRAG Retrievers
//!
//! Three strategies for turning a question into evidence:
//! - **Vector**: nearest neighbours from a named vector index
//! - **Graph**: vector candidates expanded by a caller-defined traversal
//! - **Text2Query**: the question translated to Cypher, validated and executed
//!
//! All three run behind [`Retriever::search`] and report provenance in
//! [`RetrieverResult::metadata`](graphrag_core::RetrieverResult).

pub mod graph;
pub mod schema;
pub mod strategy;
pub mod text2cypher;
pub mod vector;

pub use graph::{GraphExpansionRetriever, DEFAULT_TRAVERSAL};
pub use schema::{GraphSchema, LabelProperties, PropertyDef, RelationshipPattern, SchemaDescriptor};
pub use strategy::{Retriever, RetrieverConfig, StrategyKind, DEFAULT_TOP_K};
pub use text2cypher::{QueryTranslator, Translation, TranslatorConfig, ValidationError};
pub use vector::{validate_property_name, validate_top_k, VectorIndexConfig, VectorRetriever};
