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

//! Grounded answer generation
//!
//! One model call per request. Retries for transient provider errors belong
//! to the model client, not here.

use crate::assembler::AssembledContext;
use graphrag_core::{CallContext, CompletionOptions, LanguageModel, RagError, RagResult};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "Answer the user question using the provided context. \
     Use only the information in the context. If the context does not contain the answer, \
     say that you do not know.";

/// Answer model settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// `None` keeps the provider default
    pub temperature: Option<f32>,
    pub seed: Option<u64>,
    pub max_tokens: Option<u32>,
    pub system_instruction: String,
    /// Worked question/answer examples placed before the question
    pub examples: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: None,
            seed: None,
            max_tokens: None,
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            examples: String::new(),
        }
    }
}

impl GenerationConfig {
    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: self.temperature,
            seed: self.seed,
            max_tokens: self.max_tokens,
            system: Some(self.system_instruction.clone()),
        }
    }
}

pub struct AnswerGenerator {
    llm: Arc<dyn LanguageModel>,
    config: GenerationConfig,
}

impl AnswerGenerator {
    pub fn new(llm: Arc<dyn LanguageModel>, config: GenerationConfig) -> Self {
        Self { llm, config }
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Build the grounding prompt for `query_text`
    pub fn build_prompt(&self, query_text: &str, context: &AssembledContext) -> String {
        let mut prompt = String::from("Context:\n");
        if context.is_empty() {
            prompt.push_str("No context was retrieved for this question.\n");
        } else {
            for (i, entry) in context.evidence.iter().enumerate() {
                let _ = writeln!(prompt, "[{}] {}", i + 1, entry);
            }
        }
        if context.is_truncated() {
            let _ = writeln!(
                prompt,
                "(Only the {} highest-ranked of {} retrieved entries are shown.)",
                context.evidence.len(),
                context.evidence.len() + context.dropped
            );
        }

        let examples = self.config.examples.trim();
        if !examples.is_empty() {
            prompt.push_str("\nExamples:\n");
            prompt.push_str(examples);
            prompt.push('\n');
        }

        prompt.push_str("\nQuestion:\n");
        prompt.push_str(query_text.trim());
        prompt.push_str("\n\nAnswer:");
        prompt
    }

    /// Answer `query_text` from `context`
    #[tracing::instrument(
        skip(self, query_text, context, ctx),
        fields(model = self.llm.model_name(), evidence = context.evidence.len())
    )]
    pub async fn generate(
        &self,
        query_text: &str,
        context: &AssembledContext,
        ctx: &CallContext,
    ) -> RagResult<String> {
        let prompt = self.build_prompt(query_text, context);
        debug!(prompt = %prompt, "Generating answer");

        let options = self.config.options();
        let answer = ctx
            .guard(self.llm.complete(&prompt, &options, ctx))
            .await?
            .map_err(RagError::from)?;

        let answer = answer.trim();
        if answer.is_empty() {
            return Err(RagError::GenerationFailure(format!(
                "model '{}' returned an empty completion",
                self.llm.model_name()
            )));
        }
        Ok(answer.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use graphrag_core::LlmError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct MockLlm {
        reply: Result<String, ()>,
        calls: AtomicU32,
        options: Mutex<Option<CompletionOptions>>,
    }

    impl MockLlm {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                calls: AtomicU32::new(0),
                options: Mutex::new(None),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err(()),
                calls: AtomicU32::new(0),
                options: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl LanguageModel for MockLlm {
        async fn complete(
            &self,
            _prompt: &str,
            options: &CompletionOptions,
            _ctx: &CallContext,
        ) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.options.lock().unwrap() = Some(options.clone());
            self.reply
                .clone()
                .map_err(|_| LlmError::ApiError("HTTP 500".to_string()))
        }

        fn model_name(&self) -> &str {
            "mock"
        }
    }

    fn context(evidence: &[&str], dropped: usize) -> AssembledContext {
        AssembledContext {
            evidence: evidence.iter().map(|s| s.to_string()).collect(),
            total_size: evidence.iter().map(|s| s.len()).sum(),
            dropped,
            budget: None,
        }
    }

    #[test]
    fn test_prompt_layout() {
        let generator = AnswerGenerator::new(Arc::new(MockLlm::replying("")), GenerationConfig::default());
        let prompt = generator.build_prompt(
            "What is Toy Story about?",
            &context(&["title: Toy Story, plot: Toys come alive"], 2),
        );
        assert!(prompt.starts_with("Context:\n[1] title: Toy Story, plot: Toys come alive\n"));
        assert!(prompt.contains("Only the 1 highest-ranked of 3"));
        assert!(prompt.ends_with("Question:\nWhat is Toy Story about?\n\nAnswer:"));
        assert!(!prompt.contains("Examples:"));
    }

    #[test]
    fn test_empty_context_is_stated() {
        let generator = AnswerGenerator::new(Arc::new(MockLlm::replying("")), GenerationConfig::default());
        let prompt = generator.build_prompt("q", &context(&[], 0));
        assert!(prompt.contains("No context was retrieved"));
    }

    #[tokio::test]
    async fn test_single_call_with_configured_options() {
        let llm = Arc::new(MockLlm::replying("  Toys come alive.  "));
        let config = GenerationConfig {
            temperature: Some(0.2),
            seed: Some(7),
            ..Default::default()
        };
        let generator = AnswerGenerator::new(llm.clone(), config);

        let answer = generator
            .generate("q", &context(&["a"], 0), &CallContext::new())
            .await
            .unwrap();
        assert_eq!(answer, "Toys come alive.");
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
        let options = llm.options.lock().unwrap().clone().unwrap();
        assert_eq!(options.temperature, Some(0.2));
        assert_eq!(options.seed, Some(7));
        assert_eq!(options.system.as_deref(), Some(DEFAULT_SYSTEM_INSTRUCTION));
    }

    #[tokio::test]
    async fn test_failures_are_not_retried() {
        let llm = Arc::new(MockLlm::failing());
        let generator = AnswerGenerator::new(llm.clone(), GenerationConfig::default());
        let err = generator
            .generate("q", &context(&[], 0), &CallContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::GenerationFailure(_)));
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);

        let generator = AnswerGenerator::new(Arc::new(MockLlm::replying("   ")), GenerationConfig::default());
        let err = generator
            .generate("q", &context(&[], 0), &CallContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::GenerationFailure(_)));
    }
}
