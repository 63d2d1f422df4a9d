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

//! Scripted collaborators shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use graphrag_core::{
    CallContext, CompletionOptions, EmbedError, Embedder, LanguageModel, LlmError, Params,
    QueryStore, Record, StoreError,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

pub struct MockEmbedder {
    pub calls: AtomicU32,
    fail: bool,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicU32::new(0),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            calls: AtomicU32::new(0),
            fail: true,
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str, _ctx: &CallContext) -> Result<Vec<f32>, EmbedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(EmbedError::ApiError("model overloaded".to_string()));
        }
        Ok(vec![text.len() as f32, 0.5, 0.25])
    }

    fn model_name(&self) -> &str {
        "mock-embedding"
    }
}

/// Store that replays queued replies, then answers with no rows
pub struct ScriptedStore {
    replies: Mutex<VecDeque<Result<Vec<Record>, StoreError>>>,
    pub executed: Mutex<Vec<(String, Params)>>,
}

impl ScriptedStore {
    pub fn new(replies: Vec<Result<Vec<Record>, StoreError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.executed.lock().unwrap().len()
    }

    pub fn queries(&self) -> Vec<String> {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .map(|(q, _)| q.clone())
            .collect()
    }

    pub fn last_params(&self) -> Params {
        self.executed
            .lock()
            .unwrap()
            .last()
            .map(|(_, p)| p.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl QueryStore for ScriptedStore {
    async fn run(
        &self,
        query: &str,
        params: &Params,
        _ctx: &CallContext,
    ) -> Result<Vec<Record>, StoreError> {
        self.executed
            .lock()
            .unwrap()
            .push((query.to_string(), params.clone()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Model that replays queued completions, repeating the last one
pub struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    last: Mutex<String>,
    pub prompts: Mutex<Vec<String>>,
    pub options: Mutex<Vec<CompletionOptions>>,
    cancel_on_call: bool,
}

impl ScriptedModel {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|s| s.to_string()).collect()),
            last: Mutex::new(String::new()),
            prompts: Mutex::new(Vec::new()),
            options: Mutex::new(Vec::new()),
            cancel_on_call: false,
        }
    }

    /// Cancels the caller's context on every call
    pub fn cancelling(replies: &[&str]) -> Self {
        Self {
            cancel_on_call: true,
            ..Self::new(replies)
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
        ctx: &CallContext,
    ) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.options.lock().unwrap().push(options.clone());
        if self.cancel_on_call {
            ctx.cancel();
        }
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.replies.lock().unwrap().pop_front() {
            *last = next;
        }
        Ok(last.clone())
    }

    fn model_name(&self) -> &str {
        "mock-chat"
    }
}

pub fn row<const N: usize>(pairs: [(&str, serde_json::Value); N]) -> Record {
    Record::from_pairs(pairs)
}
