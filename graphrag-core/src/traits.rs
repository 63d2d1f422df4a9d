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

//! Capability interfaces for the external collaborators
//!
//! The core never talks to a provider directly. Implementations must be safe
//! for concurrent use: one orchestrator may serve many requests at once.

use crate::context::CallContext;
use crate::error::{EmbedError, LlmError, StoreError};
use crate::types::{Params, Record};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Turns text into a fixed-dimension vector
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str, ctx: &CallContext) -> Result<Vec<f32>, EmbedError>;

    /// Model identifier, for logging
    fn model_name(&self) -> &str;
}

/// Executes structured queries against the graph store
#[async_trait]
pub trait QueryStore: Send + Sync {
    /// Run one query with bound parameters and return every row
    async fn run(
        &self,
        query: &str,
        params: &Params,
        ctx: &CallContext,
    ) -> Result<Vec<Record>, StoreError>;

    /// Release long-lived resources held by the store handle
    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Settings forwarded with a completion request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    /// `None` leaves the provider default in place
    pub temperature: Option<f32>,
    pub seed: Option<u64>,
    pub max_tokens: Option<u32>,
    /// Optional system instruction
    pub system: Option<String>,
}

impl CompletionOptions {
    /// Zero temperature, for outputs that are executed verbatim
    pub fn deterministic() -> Self {
        Self {
            temperature: Some(0.0),
            ..Default::default()
        }
    }

    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// Completes a prompt
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
        ctx: &CallContext,
    ) -> Result<String, LlmError>;

    /// Model identifier, for logging
    fn model_name(&self) -> &str;
}
