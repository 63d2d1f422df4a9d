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

//! GraphRAG Providers
//!
//! HTTP clients for the collaborators the core depends on:
//! - [`OpenAiClient`]: `LanguageModel` and `Embedder` for OpenAI-compatible APIs
//! - [`Neo4jHttpStore`]: `QueryStore` over the Neo4j HTTP transaction API

pub mod neo4j;
pub mod openai;

pub use neo4j::{http_base_url, Neo4jConfig, Neo4jHttpStore};
pub use openai::{OpenAiClient, OpenAiConfig, DEFAULT_BASE_URL};
