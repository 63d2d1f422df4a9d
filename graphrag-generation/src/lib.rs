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

//! GraphRAG Generation
//!
//! The second half of the pipeline: evidence assembly under a budget,
//! grounded answer generation, and the [`GraphRag`] orchestrator that binds
//! a retriever to both.
//!
//! ```rust,ignore
//! let rag = GraphRag::new(retriever, AnswerGenerator::new(llm, GenerationConfig::default()));
//! let response = rag
//!     .ask("Who acted in Matrix?", &AskOptions::default().return_context(true), &CallContext::new())
//!     .await?;
//! println!("{}", response.answer);
//! ```

pub mod assembler;
pub mod generator;
pub mod orchestrator;

pub use assembler::{render_item, AssembledContext, AssemblerConfig, ContextAssembler, SizeUnit};
pub use generator::{AnswerGenerator, GenerationConfig, DEFAULT_SYSTEM_INSTRUCTION};
pub use orchestrator::{AskOptions, GraphRag};
