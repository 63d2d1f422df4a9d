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

//! Natural language to Cypher translation
//!
//! The translator drives a small state machine per request:
//!
//! ```text
//! Compose -> Generate -> Validate -> Execute -> Done
//!    ^           |           |          |
//!    |           |      (invalid)  (rejected)
//!    +-----------+-----------+----------+
//!                |
//!        (attempts exhausted) -> Failed
//! ```
//!
//! Every generated query is untrusted: nothing reaches the store without
//! passing validation first. Store rejections are fed back into the next
//! prompt so the model can repair its own query. Generation is bounded by
//! `max_retries` attempts.

pub mod prompt;
pub mod validate;

pub use prompt::{Feedback, TranslationPrompt, SYSTEM_INSTRUCTION};
pub use validate::{clean, validate, ValidationError};

use crate::schema::SchemaDescriptor;
use graphrag_core::{
    keys, CallContext, CompletionOptions, Example, GeneratedQuery, LanguageModel, Params,
    QueryStore, RagError, RagResult, Record, RetrievedItem, RetrieverResult,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Translator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    /// Generation attempts per request, including the first
    pub max_retries: u32,

    /// Permit write clauses in generated queries
    pub allow_writes: bool,

    /// Upper bound on rows turned into items
    pub max_rows: Option<usize>,

    /// Forwarded to the model with temperature 0
    pub seed: Option<u64>,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            allow_writes: false,
            max_rows: None,
            seed: None,
        }
    }
}

/// Accepted query and the rows it produced
#[derive(Debug, Clone)]
pub struct Translation {
    pub query: GeneratedQuery,
    pub rows: Vec<Record>,
}

enum State {
    Compose,
    Generate,
    Validate(GeneratedQuery),
    Execute(GeneratedQuery),
    Done(Translation),
}

/// Text-to-Cypher retriever
pub struct QueryTranslator {
    llm: Arc<dyn LanguageModel>,
    store: Arc<dyn QueryStore>,
    schema: SchemaDescriptor,
    schema_text: String,
    examples: Vec<Example>,
    config: TranslatorConfig,
}

impl QueryTranslator {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        store: Arc<dyn QueryStore>,
        schema: SchemaDescriptor,
        examples: Vec<Example>,
        config: TranslatorConfig,
    ) -> RagResult<Self> {
        if config.max_retries == 0 {
            return Err(RagError::InvalidArgument(
                "max_retries must be at least 1".to_string(),
            ));
        }
        if config.max_rows == Some(0) {
            return Err(RagError::InvalidArgument(
                "max_rows must be positive when set".to_string(),
            ));
        }
        let schema_text = schema.render();
        Ok(Self {
            llm,
            store,
            schema,
            schema_text,
            examples,
            config,
        })
    }

    /// Build a translator whose schema is read from the store
    pub async fn from_store(
        llm: Arc<dyn LanguageModel>,
        store: Arc<dyn QueryStore>,
        examples: Vec<Example>,
        config: TranslatorConfig,
        ctx: &CallContext,
    ) -> RagResult<Self> {
        let schema = SchemaDescriptor::introspect(store.as_ref(), ctx).await?;
        Self::new(llm, store, schema, examples, config)
    }

    pub fn schema(&self) -> &SchemaDescriptor {
        &self.schema
    }

    pub fn examples(&self) -> &[Example] {
        &self.examples
    }

    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    /// Translate `question`, run it and return the rows as items.
    ///
    /// Metadata carries the accepted query under `cypher` and the attempts
    /// used under `attempts`. Rows are bounded by `max_rows` only.
    pub async fn search(&self, question: &str, ctx: &CallContext) -> RagResult<RetrieverResult> {
        self.search_with_limit(question, None, ctx).await
    }

    /// As [`QueryTranslator::search`], keeping at most `min(top_k, max_rows)`
    /// rows. `rows_truncated` is set when rows were cut.
    #[tracing::instrument(skip(self, question, ctx), fields(model = self.llm.model_name()))]
    pub async fn search_with_limit(
        &self,
        question: &str,
        top_k: Option<usize>,
        ctx: &CallContext,
    ) -> RagResult<RetrieverResult> {
        let Translation { query, rows } = self.translate(question, ctx).await?;

        let total = rows.len();
        let limit = match (top_k, self.config.max_rows) {
            (Some(k), Some(max)) => k.min(max),
            (Some(limit), None) | (None, Some(limit)) => limit,
            (None, None) => usize::MAX,
        };
        let items: Vec<RetrievedItem> = rows
            .into_iter()
            .take(limit)
            .map(RetrievedItem::structured)
            .collect();

        let mut result = RetrieverResult::new(items)
            .with_metadata(keys::CYPHER, query.text)
            .with_metadata(keys::ATTEMPTS, query.attempt);
        if total > result.len() {
            result = result.with_metadata(keys::ROWS_TRUNCATED, true);
        }
        Ok(result)
    }

    /// Run the generate / validate / execute loop for one question
    pub async fn translate(&self, question: &str, ctx: &CallContext) -> RagResult<Translation> {
        if question.trim().is_empty() {
            return Err(RagError::InvalidArgument(
                "question must not be empty".to_string(),
            ));
        }

        let options = CompletionOptions::deterministic()
            .seed(self.config.seed)
            .system(SYSTEM_INSTRUCTION);
        let no_params = Params::new();

        let mut feedback: Vec<Feedback> = Vec::new();
        let mut prompt = String::new();
        let mut attempt = 0u32;
        let mut state = State::Compose;

        loop {
            ctx.check()?;
            state = match state {
                State::Compose => {
                    prompt = TranslationPrompt {
                        schema: &self.schema_text,
                        examples: &self.examples,
                        question,
                        feedback: &feedback,
                    }
                    .render();
                    debug!(feedback = feedback.len(), "Composed generation prompt");
                    State::Generate
                }

                State::Generate => {
                    if attempt >= self.config.max_retries {
                        return Err(exhausted(attempt, feedback));
                    }
                    attempt += 1;
                    debug!(attempt, prompt = %prompt, "Generating query");
                    let raw = ctx
                        .guard(self.llm.complete(&prompt, &options, ctx))
                        .await?
                        .map_err(RagError::from)?;
                    State::Validate(GeneratedQuery::new(clean(&raw), attempt))
                }

                State::Validate(mut query) => {
                    match validate(&query.text, self.config.allow_writes) {
                        Ok(()) => {
                            query.is_validated = true;
                            debug!(attempt = query.attempt, query = %query.text, "Query passed validation");
                            State::Execute(query)
                        }
                        Err(reason) => {
                            warn!(attempt = query.attempt, reason = %reason, "Generated query rejected");
                            feedback.push(Feedback::Invalid {
                                query: query.text,
                                reason: reason.to_string(),
                            });
                            State::Compose
                        }
                    }
                }

                State::Execute(query) => {
                    let outcome = ctx
                        .guard(self.store.run(&query.text, &no_params, ctx))
                        .await?;
                    match outcome {
                        Ok(rows) => {
                            debug!(attempt = query.attempt, rows = rows.len(), "Query executed");
                            State::Done(Translation { query, rows })
                        }
                        Err(error) => {
                            let message = error.to_string();
                            let error = RagError::from(error);
                            if !error.is_retryable() {
                                return Err(error);
                            }
                            warn!(attempt = query.attempt, error = %message, "Store rejected generated query");
                            feedback.push(Feedback::Rejected {
                                query: query.text,
                                error: message,
                            });
                            State::Compose
                        }
                    }
                }

                State::Done(translation) => {
                    info!(
                        attempts = translation.query.attempt,
                        rows = translation.rows.len(),
                        "Translated question to Cypher"
                    );
                    return Ok(translation);
                }
            };
        }
    }
}

fn exhausted(attempts: u32, feedback: Vec<Feedback>) -> RagError {
    let last = feedback.into_iter().last();
    RagError::QueryGenerationFailure {
        attempts,
        reason: last
            .as_ref()
            .map(|f| f.reason().to_string())
            .unwrap_or_else(|| "no attempt was made".to_string()),
        last_query: last.map(|f| f.query().to_string()),
    }
}
