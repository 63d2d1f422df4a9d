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

//! CLI configuration
//!
//! Loaded with priority file > environment > defaults. The file is TOML:
//!
//! ```toml
//! [neo4j]
//! uri = "neo4j+s://abcd1234.databases.neo4j.io"
//! username = "neo4j"
//! password = "..."
//!
//! [retrieval]
//! strategy = "graph"
//! index = "moviePlots"
//! top_k = 5
//! ```

use anyhow::{Context, Result};
use graphrag_generation::{GenerationConfig, SizeUnit};
use graphrag_retrievers::StrategyKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub neo4j: StoreSection,
    pub openai: ModelSection,
    pub retrieval: RetrievalSection,
    pub generation: GenerationSection,
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub uri: String,
    pub username: String,
    pub password: String,
    pub database: String,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            uri: "neo4j://localhost:7687".to_string(),
            username: "neo4j".to_string(),
            password: String::new(),
            database: "neo4j".to_string(),
        }
    }
}

impl fmt::Debug for StoreSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreSection")
            .field("uri", &self.uri)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSection {
    pub api_key: Option<String>,
    pub base_url: String,
    /// Answers questions
    pub chat_model: String,
    /// Writes Cypher, always at temperature 0
    pub cypher_model: String,
    pub embedding_model: String,
    /// Attempts per provider call, including the first
    pub max_attempts: u32,
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: graphrag_providers::DEFAULT_BASE_URL.to_string(),
            chat_model: "gpt-4o".to_string(),
            cypher_model: "gpt-4o".to_string(),
            embedding_model: "text-embedding-ada-002".to_string(),
            max_attempts: 3,
        }
    }
}

impl fmt::Debug for ModelSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSection")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("chat_model", &self.chat_model)
            .field("cypher_model", &self.cypher_model)
            .field("embedding_model", &self.embedding_model)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSection {
    pub strategy: StrategyKind,
    pub index: String,
    pub top_k: i64,
    pub return_properties: Vec<String>,
    /// Template for the graph strategy; the bundled movie template when unset
    pub traversal_query: Option<String>,
    /// Hand-written schema for text2query; the bundled movie schema when unset
    pub schema_file: Option<PathBuf>,
    /// Read the schema from the database when no schema file is given
    pub introspect_schema: bool,
    /// One `USER INPUT: '...' QUERY: ...` line per example
    pub examples_file: Option<PathBuf>,
    pub max_retries: u32,
    pub max_rows: Option<usize>,
    pub allow_writes: bool,
    pub budget: Option<usize>,
    pub size_unit: SizeUnit,
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Vector,
            index: "moviePlots".to_string(),
            top_k: 5,
            return_properties: vec!["title".to_string(), "plot".to_string()],
            traversal_query: None,
            schema_file: None,
            introspect_schema: false,
            examples_file: None,
            max_retries: 3,
            max_rows: None,
            allow_writes: false,
            budget: None,
            size_unit: SizeUnit::Chars,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSection {
    pub temperature: Option<f32>,
    pub seed: Option<u64>,
    pub max_tokens: Option<u32>,
    pub system_instruction: Option<String>,
}

impl GenerationSection {
    pub fn to_config(&self) -> GenerationConfig {
        let mut config = GenerationConfig {
            temperature: self.temperature,
            seed: self.seed,
            max_tokens: self.max_tokens,
            ..Default::default()
        };
        if let Some(system) = &self.system_instruction {
            config.system_instruction = system.clone();
        }
        config
    }
}

impl RagConfig {
    /// `<config_dir>/graphrag/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("graphrag").join("config.toml"))
    }

    /// Defaults overridden by the variables `lookup` resolves
    ///
    /// Supported environment variables:
    /// - NEO4J_URI, NEO4J_USERNAME, NEO4J_PASSWORD, NEO4J_DATABASE
    /// - OPENAI_API_KEY, OPENAI_BASE_URL
    /// - GRAPHRAG_CHAT_MODEL, GRAPHRAG_CYPHER_MODEL, GRAPHRAG_EMBEDDING_MODEL
    /// - GRAPHRAG_VECTOR_INDEX
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let set = |target: &mut String, key: &str| {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *target = value;
            }
        };

        set(&mut config.neo4j.uri, "NEO4J_URI");
        set(&mut config.neo4j.username, "NEO4J_USERNAME");
        set(&mut config.neo4j.password, "NEO4J_PASSWORD");
        set(&mut config.neo4j.database, "NEO4J_DATABASE");
        set(&mut config.openai.base_url, "OPENAI_BASE_URL");
        set(&mut config.openai.chat_model, "GRAPHRAG_CHAT_MODEL");
        set(&mut config.openai.cypher_model, "GRAPHRAG_CYPHER_MODEL");
        set(&mut config.openai.embedding_model, "GRAPHRAG_EMBEDDING_MODEL");
        set(&mut config.retrieval.index, "GRAPHRAG_VECTOR_INDEX");
        if let Some(key) = lookup("OPENAI_API_KEY").filter(|v| !v.is_empty()) {
            config.openai.api_key = Some(key);
        }

        config
    }

    /// Load configuration with priority: file > env > defaults.
    ///
    /// An explicit path must exist; the default path is optional.
    pub fn load(config_file: Option<PathBuf>) -> Result<Self> {
        Self::load_with(config_file, |key| std::env::var(key).ok())
    }

    fn load_with(
        config_file: Option<PathBuf>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let base = Self::from_lookup(lookup);
        let path = match config_file {
            Some(path) if path.exists() => path,
            Some(path) => anyhow::bail!("config file not found: {}", path.display()),
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => path,
                None => return Ok(base),
            },
        };

        tracing::info!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let file: toml::Value =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;

        let mut merged = toml::Value::try_from(&base).context("serializing configuration")?;
        overlay(&mut merged, file);
        merged
            .try_into()
            .with_context(|| format!("invalid configuration in {}", path.display()))
    }
}

/// Deep-merge `top` over `base`, tables key by key
fn overlay(base: &mut toml::Value, top: toml::Value) {
    match (base, top) {
        (toml::Value::Table(base), toml::Value::Table(top)) => {
            for (key, value) in top {
                match base.get_mut(&key) {
                    Some(existing) => overlay(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, top) => *base = top,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_follow_movie_setup() {
        let config = RagConfig::default();
        assert_eq!(config.retrieval.index, "moviePlots");
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.openai.embedding_model, "text-embedding-ada-002");
        assert_eq!(config.openai.cypher_model, "gpt-4o");
    }

    #[test]
    fn test_env_overrides_defaults() {
        let config = RagConfig::from_lookup(env(&[
            ("NEO4J_URI", "neo4j+s://demo.databases.neo4j.io"),
            ("OPENAI_API_KEY", "sk-env"),
            ("GRAPHRAG_VECTOR_INDEX", "plots"),
        ]));
        assert_eq!(config.neo4j.uri, "neo4j+s://demo.databases.neo4j.io");
        assert_eq!(config.openai.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.retrieval.index, "plots");
        assert_eq!(config.neo4j.username, "neo4j");
    }

    #[test]
    fn test_file_overrides_env() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[neo4j]\nuri = \"bolt://file-host:7687\"\n\n[retrieval]\nstrategy = \"text2query\"\nmax_rows = 20"
        )
        .unwrap();

        let config = RagConfig::load_with(
            Some(file.path().to_path_buf()),
            env(&[("NEO4J_URI", "neo4j://env-host"), ("NEO4J_PASSWORD", "pw")]),
        )
        .unwrap();

        assert_eq!(config.neo4j.uri, "bolt://file-host:7687");
        assert_eq!(config.neo4j.password, "pw");
        assert_eq!(config.retrieval.strategy, StrategyKind::Text2Query);
        assert_eq!(config.retrieval.max_rows, Some(20));
        assert_eq!(config.retrieval.index, "moviePlots");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = RagConfig::load_with(Some(dir.path().join("absent.toml")), env(&[]));
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_hides_secrets() {
        let mut config = RagConfig::default();
        config.neo4j.password = "hunter2".to_string();
        config.openai.api_key = Some("sk-live".to_string());
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("sk-live"));
    }
}
