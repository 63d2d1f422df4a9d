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

//! GraphRAG Core
//!
//! Shared vocabulary for the retrieval-augmented generation pipeline:
//! - **Data model**: retrieved items, retriever results, responses, examples
//! - **Errors**: one taxonomy for every stage, plus collaborator error enums
//! - **Collaborators**: `Embedder`, `QueryStore` and `LanguageModel` traits
//! - **Call context**: cancellation and deadlines threaded through every call
//!
//! The core never implements an embedding model, a language model or a graph
//! database. Concrete clients live in `graphrag-providers`.

pub mod context;
pub mod error;
pub mod resilience;
pub mod traits;
pub mod types;

pub use context::{CallContext, CancelReason};
pub use error::{EmbedError, LlmError, RagError, RagResult, StoreError};
pub use resilience::{RetryError, RetryPolicy};
pub use traits::{CompletionOptions, Embedder, LanguageModel, QueryStore};
pub use types::{
    keys, ContextReport, Example, GeneratedQuery, ItemContent, Params, Record, Response,
    RetrievedItem, RetrieverResult, Scalar,
};
