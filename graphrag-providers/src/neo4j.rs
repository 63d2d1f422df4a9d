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

//! Neo4j store over the HTTP transaction API
//!
//! Every `run` is one auto-commit transaction (`POST /db/{database}/tx/commit`),
//! so nothing stays open on the server between calls, including after a
//! failed statement.

use async_trait::async_trait;
use graphrag_core::{CallContext, Params, QueryStore, RagError, RagResult, Record, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// Store connection settings
#[derive(Clone, Serialize, Deserialize)]
pub struct Neo4jConfig {
    /// `neo4j://`, `neo4j+s://`, `bolt://` or a plain `http(s)://` endpoint
    pub uri: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
}

fn default_database() -> String {
    "neo4j".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Neo4jConfig {
    pub fn new(
        uri: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            uri: uri.into(),
            username: username.into(),
            password: password.into(),
            database: default_database(),
            timeout: default_timeout(),
        }
    }
}

impl fmt::Debug for Neo4jConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Neo4jConfig")
            .field("uri", &self.uri)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Map a driver URI onto the HTTP endpoint of the same server
pub fn http_base_url(uri: &str) -> RagResult<String> {
    let uri = uri.trim().trim_end_matches('/');
    let (scheme, rest) = uri
        .split_once("://")
        .ok_or_else(|| RagError::Config(format!("'{}' is not a URI", uri)))?;
    let host = rest.split(['/', '?']).next().unwrap_or_default();
    if host.is_empty() {
        return Err(RagError::Config(format!("'{}' has no host", uri)));
    }
    let hostname = match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    };

    match scheme {
        "http" | "https" => Ok(format!("{}://{}", scheme, host)),
        "neo4j+s" | "neo4j+ssc" | "bolt+s" | "bolt+ssc" => Ok(format!("https://{}", hostname)),
        "neo4j" | "bolt" => Ok(format!("http://{}:7474", hostname)),
        other => Err(RagError::Config(format!(
            "unsupported URI scheme '{}' in '{}'",
            other, uri
        ))),
    }
}

#[derive(Serialize)]
struct CommitRequest<'a> {
    statements: [Statement<'a>; 1],
}

#[derive(Serialize)]
struct Statement<'a> {
    statement: &'a str,
    parameters: &'a Params,
}

#[derive(Deserialize)]
struct CommitResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    #[serde(default)]
    errors: Vec<ServerError>,
}

#[derive(Deserialize)]
struct StatementResult {
    columns: Vec<String>,
    #[serde(default)]
    data: Vec<DataRow>,
}

#[derive(Deserialize)]
struct DataRow {
    row: Vec<Value>,
}

#[derive(Deserialize)]
struct ServerError {
    code: String,
    message: String,
}

/// Classify a Neo4j status code
fn classify(error: ServerError) -> StoreError {
    let ServerError { code, message } = error;
    if code.starts_with("Neo.ClientError.Security.") {
        StoreError::Connection(format!("{}: {}", code, message))
    } else if code == "Neo.ClientError.Statement.SyntaxError" {
        StoreError::Syntax { code, message }
    } else {
        StoreError::Runtime { code, message }
    }
}

/// `QueryStore` backed by the Neo4j HTTP API
pub struct Neo4jHttpStore {
    config: Neo4jConfig,
    endpoint: String,
    client: reqwest::Client,
    closed: AtomicBool,
}

impl fmt::Debug for Neo4jHttpStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Neo4jHttpStore")
            .field("endpoint", &self.endpoint)
            .field("config", &self.config)
            .finish()
    }
}

impl Neo4jHttpStore {
    pub fn new(config: Neo4jConfig) -> RagResult<Self> {
        let base = http_base_url(&config.uri)?;
        let endpoint = format!("{}/db/{}/tx/commit", base, config.database);
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RagError::Config(format!("HTTP client: {}", e)))?;
        info!(endpoint = %endpoint, user = %config.username, "Using Neo4j HTTP endpoint");
        Ok(Self {
            config,
            endpoint,
            client,
            closed: AtomicBool::new(false),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl QueryStore for Neo4jHttpStore {
    async fn run(
        &self,
        query: &str,
        params: &Params,
        ctx: &CallContext,
    ) -> Result<Vec<Record>, StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Connection("store handle is closed".to_string()));
        }
        let request = CommitRequest {
            statements: [Statement {
                statement: query,
                parameters: params,
            }],
        };

        let mut builder = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .header("Accept", "application/json;charset=UTF-8")
            .json(&request);
        if let Some(left) = ctx.remaining() {
            builder = builder.timeout(left.min(self.config.timeout));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Connection(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        let body: CommitResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Connection(format!("undecodable response: {}", e)))?;
        if let Some(error) = body.errors.into_iter().next() {
            return Err(classify(error));
        }

        let Some(result) = body.results.into_iter().next() else {
            return Ok(Vec::new());
        };
        let columns = result.columns;
        let records = result
            .data
            .into_iter()
            .map(|data| {
                Record::from_columns(&columns, data.row).ok_or_else(|| {
                    StoreError::Connection("row width does not match the column header".to_string())
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(rows = records.len(), "Statement committed");
        Ok(records)
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_mapping() {
        assert_eq!(
            http_base_url("neo4j+s://abcd1234.databases.neo4j.io").unwrap(),
            "https://abcd1234.databases.neo4j.io"
        );
        assert_eq!(
            http_base_url("neo4j://localhost:7687").unwrap(),
            "http://localhost:7474"
        );
        assert_eq!(http_base_url("bolt://10.0.0.5").unwrap(), "http://10.0.0.5:7474");
        assert_eq!(
            http_base_url("http://localhost:7474/").unwrap(),
            "http://localhost:7474"
        );
        assert!(matches!(http_base_url("localhost"), Err(RagError::Config(_))));
        assert!(matches!(http_base_url("ftp://host"), Err(RagError::Config(_))));
    }

    #[test]
    fn test_error_classification() {
        let error = |code: &str| ServerError {
            code: code.to_string(),
            message: "boom".to_string(),
        };
        assert!(matches!(
            classify(error("Neo.ClientError.Statement.SyntaxError")),
            StoreError::Syntax { .. }
        ));
        assert!(matches!(
            classify(error("Neo.ClientError.Statement.ParameterMissing")),
            StoreError::Runtime { .. }
        ));
        assert!(matches!(
            classify(error("Neo.DatabaseError.General.UnknownError")),
            StoreError::Runtime { .. }
        ));
        assert!(matches!(
            classify(error("Neo.ClientError.Security.Unauthorized")),
            StoreError::Connection(_)
        ));
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = Neo4jConfig::new("neo4j://localhost", "neo4j", "hunter2");
        assert!(!format!("{:?}", config).contains("hunter2"));
    }
}
