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

//! Orchestrator: retrieve, assemble, generate

use crate::assembler::ContextAssembler;
use crate::generator::AnswerGenerator;
use graphrag_core::{CallContext, QueryStore, RagError, RagResult, Response};
use graphrag_retrievers::{Retriever, RetrieverConfig, StrategyKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

/// Per-call options for [`GraphRag::ask`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AskOptions {
    /// Overrides `retriever_config.top_k`
    pub top_k: Option<i64>,
    /// Attach the retriever result to the response
    pub return_context: bool,
    pub retriever_config: RetrieverConfig,
    /// Overrides the assembler's default budget
    pub budget: Option<usize>,
}

impl AskOptions {
    pub fn top_k(mut self, top_k: i64) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn return_context(mut self, return_context: bool) -> Self {
        self.return_context = return_context;
        self
    }

    pub fn budget(mut self, budget: usize) -> Self {
        self.budget = Some(budget);
        self
    }
}

/// One retrieval strategy bound to an answer generator.
///
/// Holds no per-request state; share it behind an `Arc` to serve
/// concurrent requests.
pub struct GraphRag {
    retriever: Retriever,
    assembler: ContextAssembler,
    generator: AnswerGenerator,
    defaults: RetrieverConfig,
    store: Option<Arc<dyn QueryStore>>,
}

impl GraphRag {
    pub fn new(retriever: impl Into<Retriever>, generator: AnswerGenerator) -> Self {
        Self {
            retriever: retriever.into(),
            assembler: ContextAssembler::default(),
            generator,
            defaults: RetrieverConfig::default(),
            store: None,
        }
    }

    pub fn with_assembler(mut self, assembler: ContextAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    /// Retriever settings used when a call leaves them unset
    pub fn with_retriever_config(mut self, defaults: RetrieverConfig) -> Self {
        self.defaults = defaults;
        self
    }

    /// Store handle released by [`GraphRag::close`]
    pub fn with_store(mut self, store: Arc<dyn QueryStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn strategy(&self) -> StrategyKind {
        self.retriever.kind()
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Answer `query_text` with the bound strategy
    pub async fn ask(
        &self,
        query_text: &str,
        options: &AskOptions,
        ctx: &CallContext,
    ) -> RagResult<Response> {
        let span = info_span!(
            "ask",
            request_id = %Uuid::new_v4(),
            strategy = %self.retriever.kind()
        );
        self.ask_inner(query_text, options, ctx).instrument(span).await
    }

    async fn ask_inner(
        &self,
        query_text: &str,
        options: &AskOptions,
        ctx: &CallContext,
    ) -> RagResult<Response> {
        if query_text.trim().is_empty() {
            return Err(RagError::InvalidArgument(
                "query text must not be empty".to_string(),
            ));
        }
        let config = self.resolve_config(options);

        let result = self.retriever.search(query_text, &config, ctx).await?;
        let context = self.assembler.assemble(&result, options.budget);
        let answer = self.generator.generate(query_text, &context, ctx).await?;

        info!(
            items = result.len(),
            included = context.evidence.len(),
            dropped = context.dropped,
            "Answered query"
        );

        Ok(Response {
            answer,
            context: context.report(),
            retriever_result: options.return_context.then_some(result),
        })
    }

    /// Merge call options over the orchestrator defaults
    fn resolve_config(&self, options: &AskOptions) -> RetrieverConfig {
        let call = &options.retriever_config;
        let mut query_params = self.defaults.query_params.clone();
        query_params.extend(call.query_params.iter().map(|(k, v)| (k.clone(), v.clone())));

        RetrieverConfig {
            top_k: options.top_k.or(call.top_k).or(self.defaults.top_k),
            return_properties: call
                .return_properties
                .clone()
                .or_else(|| self.defaults.return_properties.clone()),
            traversal_query: call
                .traversal_query
                .clone()
                .or_else(|| self.defaults.traversal_query.clone()),
            query_params,
        }
    }

    /// Release the store handle
    pub async fn close(self) -> RagResult<()> {
        if let Some(store) = self.store {
            store.close().await.map_err(RagError::from)?;
            info!("Store handle closed");
        }
        Ok(())
    }
}
