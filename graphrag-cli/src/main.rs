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

//! graphrag CLI
//!
//! Ask one question against a Neo4j graph with a chosen retrieval strategy.

mod config;
mod movies;

use anyhow::{Context, Result};
use clap::Parser;
use config::RagConfig;
use graphrag_core::{CallContext, Example, RagError, RetrieverResult};
use graphrag_generation::{
    AnswerGenerator, AskOptions, AssemblerConfig, ContextAssembler, GraphRag,
};
use graphrag_providers::{Neo4jConfig, Neo4jHttpStore, OpenAiClient, OpenAiConfig};
use graphrag_retrievers::{
    GraphExpansionRetriever, QueryTranslator, Retriever, RetrieverConfig, SchemaDescriptor,
    StrategyKind, TranslatorConfig, VectorIndexConfig, VectorRetriever,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "graphrag")]
#[command(about = "Answer questions from a Neo4j knowledge graph", long_about = None)]
#[command(version)]
struct Cli {
    /// Question to answer
    #[arg(short, long)]
    query: String,

    /// Retrieval strategy: vector, graph or text2query
    #[arg(short, long)]
    strategy: Option<StrategyKind>,

    /// Number of items to retrieve
    #[arg(short = 'k', long)]
    top_k: Option<i64>,

    /// Print the retrieved context and generated query
    #[arg(long)]
    return_context: bool,

    /// Configuration file (default: <config dir>/graphrag/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Vector index name
    #[arg(long)]
    index: Option<String>,

    /// Traversal template for the graph strategy
    #[arg(long)]
    traversal_query: Option<String>,

    /// Hand-written schema for text2query
    #[arg(long)]
    schema_file: Option<PathBuf>,

    /// Examples for text2query, one `USER INPUT: '...' QUERY: ...` per line
    #[arg(long)]
    examples_file: Option<PathBuf>,

    /// Read the text2query schema from the database instead of the bundled one
    #[arg(long)]
    introspect_schema: bool,

    /// Query generation attempts for text2query
    #[arg(long)]
    max_retries: Option<u32>,

    /// Context budget in the configured unit
    #[arg(long)]
    budget: Option<usize>,

    /// Give up after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Output JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "graphrag=debug" } else { "graphrag=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(2);
        }
    };

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

/// Config and argument problems exit with 2, everything else with 1
fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<RagError>() {
        Some(RagError::Config(_)) | Some(RagError::InvalidArgument(_)) => 2,
        _ => 1,
    }
}

/// File/env configuration with command-line flags on top
fn load_config(cli: &Cli) -> Result<RagConfig> {
    let mut config = RagConfig::load(cli.config.clone())?;
    let retrieval = &mut config.retrieval;
    if let Some(strategy) = cli.strategy {
        retrieval.strategy = strategy;
    }
    if let Some(top_k) = cli.top_k {
        retrieval.top_k = top_k;
    }
    if let Some(index) = &cli.index {
        retrieval.index = index.clone();
    }
    if let Some(template) = &cli.traversal_query {
        retrieval.traversal_query = Some(template.clone());
    }
    if let Some(path) = &cli.schema_file {
        retrieval.schema_file = Some(path.clone());
    }
    if let Some(path) = &cli.examples_file {
        retrieval.examples_file = Some(path.clone());
    }
    if cli.introspect_schema {
        retrieval.introspect_schema = true;
    }
    if let Some(max_retries) = cli.max_retries {
        retrieval.max_retries = max_retries;
    }
    if cli.budget.is_some() {
        retrieval.budget = cli.budget;
    }

    if config.openai.api_key.is_none() {
        anyhow::bail!("no OpenAI API key: set OPENAI_API_KEY or openai.api_key in the config file");
    }
    Ok(config)
}

async fn run(cli: Cli, config: RagConfig) -> Result<()> {
    let ctx = match cli.timeout_secs {
        Some(secs) => CallContext::with_timeout(Duration::from_secs(secs)),
        None => CallContext::new(),
    };
    let interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling request");
            interrupt.cancel();
        }
    });

    let rag = build(&config, &ctx).await?;
    info!(strategy = %rag.strategy(), "Pipeline ready");

    let options = AskOptions::default().return_context(cli.return_context);
    let outcome = rag.ask(&cli.query, &options, &ctx).await;
    if let Err(e) = rag.close().await {
        warn!("Failed to close store: {}", e);
    }
    let response = outcome?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("{}", response.answer);
    if response.context.is_truncated() {
        eprintln!(
            "(context truncated: {} of {} entries used)",
            response.context.included,
            response.context.included + response.context.dropped
        );
    }
    if let Some(result) = &response.retriever_result {
        print_context(result);
    }
    Ok(())
}

fn print_context(result: &RetrieverResult) {
    if let Some(cypher) = result.generated_query() {
        println!("\nCYPHER : {}", cypher);
    }
    println!("\nCONTEXT:");
    for item in &result.items {
        println!("{}", item);
    }
}

/// Wire providers, store and the configured strategy together
async fn build(config: &RagConfig, ctx: &CallContext) -> Result<GraphRag> {
    let store_config = Neo4jConfig {
        database: config.neo4j.database.clone(),
        ..Neo4jConfig::new(
            config.neo4j.uri.clone(),
            config.neo4j.username.clone(),
            config.neo4j.password.clone(),
        )
    };
    let store = Arc::new(Neo4jHttpStore::new(store_config)?);

    let mut openai = OpenAiConfig::new(config.openai.api_key.clone().unwrap_or_default());
    openai.base_url = config.openai.base_url.clone();
    openai.retry.max_attempts = config.openai.max_attempts.max(1);
    let client = OpenAiClient::new(openai, config.openai.chat_model.clone())
        .with_embedding_model(config.openai.embedding_model.clone());

    let retrieval = &config.retrieval;
    let index = VectorIndexConfig::new(retrieval.index.clone());
    let retriever: Retriever = match retrieval.strategy {
        StrategyKind::Vector => VectorRetriever::new(store.clone(), Arc::new(client.clone()), index)
            .return_properties(retrieval.return_properties.iter().cloned())
            .into(),
        StrategyKind::Graph => {
            let template = retrieval
                .traversal_query
                .clone()
                .unwrap_or_else(|| movies::MOVIE_TRAVERSAL.to_string());
            GraphExpansionRetriever::new(store.clone(), Arc::new(client.clone()), index, template)
                .into()
        }
        StrategyKind::Text2Query => {
            let translator_config = TranslatorConfig {
                max_retries: retrieval.max_retries,
                allow_writes: retrieval.allow_writes,
                max_rows: retrieval.max_rows,
                ..Default::default()
            };
            let cypher_llm = Arc::new(client.with_model(config.openai.cypher_model.clone()));
            let examples = load_examples(retrieval.examples_file.as_deref())?;
            let schema = match &retrieval.schema_file {
                Some(path) => Some(SchemaDescriptor::text(
                    std::fs::read_to_string(path)
                        .with_context(|| format!("reading schema {}", path.display()))?,
                )),
                None if retrieval.introspect_schema => None,
                None => Some(SchemaDescriptor::text(movies::MOVIE_SCHEMA)),
            };
            let translator = match schema {
                Some(schema) => QueryTranslator::new(
                    cypher_llm,
                    store.clone(),
                    schema,
                    examples,
                    translator_config,
                )?,
                None => {
                    QueryTranslator::from_store(
                        cypher_llm,
                        store.clone(),
                        examples,
                        translator_config,
                        ctx,
                    )
                    .await?
                }
            };
            translator.into()
        }
    };

    let generator = AnswerGenerator::new(Arc::new(client), config.generation.to_config());
    let assembler = ContextAssembler::new(AssemblerConfig {
        budget: retrieval.budget,
        unit: retrieval.size_unit,
    });

    Ok(GraphRag::new(retriever, generator)
        .with_assembler(assembler)
        .with_retriever_config(RetrieverConfig::default().top_k(retrieval.top_k))
        .with_store(store))
}

/// Examples from a file, or the bundled movie example
fn load_examples(path: Option<&Path>) -> Result<Vec<Example>> {
    let content = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading examples {}", path.display()))?,
        None => movies::MOVIE_EXAMPLES.to_string(),
    };
    parse_examples(&content)
}

fn parse_examples(content: &str) -> Result<Vec<Example>> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.parse::<Example>().map_err(anyhow::Error::from))
        .collect()
}
