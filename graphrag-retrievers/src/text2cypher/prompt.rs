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

//! Generation prompt for the text-to-Cypher translator

use graphrag_core::Example;
use std::fmt::Write;

/// System instruction sent with every generation request
pub const SYSTEM_INSTRUCTION: &str = "You translate questions into Cypher queries for a Neo4j \
     graph database. Respond with exactly one Cypher query and nothing else: no prose, \
     no explanation, no Markdown.";

/// A failed attempt carried into the next prompt
#[derive(Debug, Clone, PartialEq)]
pub enum Feedback {
    /// Rejected by the local shape check
    Invalid { query: String, reason: String },
    /// Rejected by the store
    Rejected { query: String, error: String },
}

impl Feedback {
    pub fn query(&self) -> &str {
        match self {
            Feedback::Invalid { query, .. } | Feedback::Rejected { query, .. } => query,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            Feedback::Invalid { reason, .. } => reason,
            Feedback::Rejected { error, .. } => error,
        }
    }
}

pub struct TranslationPrompt<'a> {
    pub schema: &'a str,
    pub examples: &'a [Example],
    pub question: &'a str,
    pub feedback: &'a [Feedback],
}

impl TranslationPrompt<'_> {
    pub fn render(&self) -> String {
        let mut prompt = String::new();
        prompt.push_str(
            "Task: Generate a Cypher statement for querying a Neo4j graph database from a user input.\n\n",
        );

        prompt.push_str("Schema:\n");
        prompt.push_str(self.schema.trim());
        prompt.push_str("\n\n");

        if !self.examples.is_empty() {
            prompt.push_str("Examples:\n");
            for example in self.examples {
                let _ = writeln!(prompt, "{}", example);
            }
            prompt.push('\n');
        }

        prompt.push_str("Input:\n");
        prompt.push_str(self.question.trim());
        prompt.push_str("\n\n");

        if !self.feedback.is_empty() {
            prompt.push_str("Previous attempts failed. Do not repeat them:\n");
            for (i, fb) in self.feedback.iter().enumerate() {
                let source = match fb {
                    Feedback::Invalid { .. } => "rejected before execution",
                    Feedback::Rejected { .. } => "rejected by the database",
                };
                let _ = writeln!(
                    prompt,
                    "Attempt {}: {}\nQuery: {}\nError: {}",
                    i + 1,
                    source,
                    fb.query(),
                    fb.reason()
                );
            }
            prompt.push('\n');
        }

        prompt.push_str(
            "Use only the node labels, relationship types and properties in the schema.\n\
             Do not include triple backticks or any text other than the Cypher statement.\n\n\
             Cypher query:",
        );
        prompt
    }
}
