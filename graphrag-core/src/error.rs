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

//! Error taxonomy for the RAG core and its collaborators

use crate::context::CancelReason;
use thiserror::Error;

/// Result type for RAG operations
pub type RagResult<T> = Result<T, RagError>;

/// Errors surfaced by retrievers, the generator and the orchestrator
#[derive(Debug, Error)]
pub enum RagError {
    /// Bad caller input (non-positive top_k, empty query, bad property name)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Embedding or vector index failure
    #[error("Retrieval failed: {0}")]
    RetrievalFailure(String),

    /// Structured query rejected by the store's parser
    #[error("Query syntax error: {0}")]
    QuerySyntax(String),

    /// Structured query failed while executing
    #[error("Query runtime error: {0}")]
    QueryRuntime(String),

    /// Store unreachable or credentials rejected
    #[error("Connection error: {0}")]
    Connection(String),

    /// Text-to-query translation exhausted its attempts
    #[error("Query generation failed after {attempts} attempt(s): {reason}")]
    QueryGenerationFailure {
        attempts: u32,
        reason: String,
        last_query: Option<String>,
    },

    /// Language model call failed
    #[error("Generation failed: {0}")]
    GenerationFailure(String),

    /// Caller cancelled the request or its deadline passed
    #[error("Request cancelled: {0}")]
    Cancelled(CancelReason),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RagError {
    /// Store-side rejections the text-to-query loop may feed back to the model
    pub fn is_retryable(&self) -> bool {
        matches!(self, RagError::QuerySyntax(_) | RagError::QueryRuntime(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RagError::Cancelled(_))
    }
}

/// Errors from embedding providers
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

/// Errors from the graph store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{code}: {message}")]
    Syntax { code: String, message: String },

    #[error("{code}: {message}")]
    Runtime { code: String, message: String },

    #[error("{0}")]
    Connection(String),
}

impl StoreError {
    pub fn syntax(message: impl Into<String>) -> Self {
        StoreError::Syntax {
            code: "Neo.ClientError.Statement.SyntaxError".to_string(),
            message: message.into(),
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        StoreError::Runtime {
            code: "Neo.ClientError.Statement.ExecutionFailed".to_string(),
            message: message.into(),
        }
    }
}

/// Errors from language model clients
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl From<EmbedError> for RagError {
    fn from(e: EmbedError) -> Self {
        RagError::RetrievalFailure(format!("embedding failed: {}", e))
    }
}

impl From<StoreError> for RagError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Syntax { .. } => RagError::QuerySyntax(e.to_string()),
            StoreError::Runtime { .. } => RagError::QueryRuntime(e.to_string()),
            StoreError::Connection(msg) => RagError::Connection(msg),
        }
    }
}

impl From<LlmError> for RagError {
    fn from(e: LlmError) -> Self {
        RagError::GenerationFailure(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_mapping() {
        let err: RagError = StoreError::syntax("Invalid input 'MATC'").into();
        assert!(matches!(err, RagError::QuerySyntax(_)));
        assert!(err.is_retryable());
        assert!(err.to_string().contains("SyntaxError"));

        let err: RagError = StoreError::Connection("refused".to_string()).into();
        assert!(matches!(err, RagError::Connection(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_embed_error_is_retrieval_failure() {
        let err: RagError = EmbedError::RateLimitExceeded.into();
        assert!(matches!(err, RagError::RetrievalFailure(_)));
    }
}
