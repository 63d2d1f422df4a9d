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

//! Context assembly
//!
//! Turns retrieved items into an ordered list of evidence strings under an
//! optional size budget. Items are never split: the assembler keeps the
//! longest ranked prefix that fits and reports how many items it dropped.

use graphrag_core::{ContextReport, ItemContent, RetrievedItem, RetrieverResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Unit the budget is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeUnit {
    /// Unicode scalar values
    #[default]
    Chars,
    /// Estimated tokens, about four characters each
    Tokens,
}

impl SizeUnit {
    pub fn measure(&self, text: &str) -> usize {
        let chars = text.chars().count();
        match self {
            SizeUnit::Chars => chars,
            SizeUnit::Tokens => (chars + 3) / 4,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblerConfig {
    /// Default budget when a call does not pass one
    pub budget: Option<usize>,
    pub unit: SizeUnit,
}

/// Evidence ready for the prompt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssembledContext {
    /// Rendered items, best first
    pub evidence: Vec<String>,
    /// Combined size of `evidence`
    pub total_size: usize,
    /// Items left out to honor the budget
    pub dropped: usize,
    pub budget: Option<usize>,
}

impl AssembledContext {
    pub fn is_truncated(&self) -> bool {
        self.dropped > 0
    }

    pub fn is_empty(&self) -> bool {
        self.evidence.is_empty()
    }

    pub fn report(&self) -> ContextReport {
        ContextReport {
            included: self.evidence.len(),
            dropped: self.dropped,
            total_size: self.total_size,
            budget: self.budget,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContextAssembler {
    config: AssemblerConfig,
}

impl ContextAssembler {
    pub fn new(config: AssemblerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    /// Render `result` in rank order, stopping at the first item that
    /// would overflow `budget` (or the configured default).
    pub fn assemble(&self, result: &RetrieverResult, budget: Option<usize>) -> AssembledContext {
        let budget = budget.or(self.config.budget);
        let mut context = AssembledContext {
            budget,
            ..Default::default()
        };

        for (i, item) in result.items.iter().enumerate() {
            let text = render_item(item);
            let size = self.config.unit.measure(&text);
            if let Some(limit) = budget {
                if context.total_size + size > limit {
                    context.dropped = result.items.len() - i;
                    tracing::debug!(
                        included = context.evidence.len(),
                        dropped = context.dropped,
                        budget = limit,
                        "Context truncated to budget"
                    );
                    break;
                }
            }
            context.total_size += size;
            context.evidence.push(text);
        }

        context
    }
}

/// Text of one item, field names preserved
pub fn render_item(item: &RetrievedItem) -> String {
    match &item.content {
        ItemContent::Text(text) => match item.score {
            Some(score) => format!("{}, score: {}", text, score),
            None => text.clone(),
        },
        ItemContent::Structured(record) => {
            let mut fields: Vec<String> = record
                .iter()
                .map(|(key, value)| format!("{}: {}", key, render_value(value)))
                .collect();
            if let Some(score) = item.score {
                let has_score = record
                    .keys()
                    .iter()
                    .any(|k| k == "score" || k == "similarityScore");
                if !has_score {
                    fields.push(format!("score: {}", score));
                }
            }
            fields.join(", ")
        }
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => format!(
            "[{}]",
            items.iter().map(render_value).collect::<Vec<_>>().join(", ")
        ),
        other => other.to_string(),
    }
}
