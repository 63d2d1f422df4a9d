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

//! HTTP-level tests for the provider clients against a local mock server

use graphrag_core::{
    CallContext, CompletionOptions, Embedder, LanguageModel, LlmError, Params, QueryStore,
    RetryPolicy, StoreError,
};
use graphrag_providers::{Neo4jConfig, Neo4jHttpStore, OpenAiClient, OpenAiConfig};
use mockito::Matcher;
use serde_json::json;
use std::time::Duration;

fn openai(url: String) -> OpenAiClient {
    let mut config = OpenAiConfig::new("sk-test");
    config.base_url = url;
    config.retry = RetryPolicy {
        max_attempts: 3,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
        multiplier: 1.0,
        jitter: 0.0,
    };
    OpenAiClient::new(config, "gpt-4o").with_embedding_model("text-embedding-ada-002")
}

fn neo4j(url: String) -> Neo4jHttpStore {
    Neo4jHttpStore::new(Neo4jConfig::new(url, "neo4j", "secret")).unwrap()
}

/// Completion requests carry the prompt, system text and settings
#[tokio::test]
async fn test_chat_completion() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-4o",
            "temperature": 0.0,
            "seed": 42,
            "messages": [
                {"role": "system", "content": "Only Cypher."},
                {"role": "user", "content": "Who acted in Matrix?"}
            ]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"MATCH (n) RETURN n"}}]}"#)
        .expect(1)
        .create_async()
        .await;

    let options = CompletionOptions::deterministic()
        .seed(Some(42))
        .system("Only Cypher.");
    let reply = openai(server.url())
        .complete("Who acted in Matrix?", &options, &CallContext::new())
        .await
        .unwrap();

    assert_eq!(reply, "MATCH (n) RETURN n");
    mock.assert_async().await;
}

/// 503 responses are retried until the policy gives up
#[tokio::test]
async fn test_server_errors_are_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .with_status(503)
        .with_body("overloaded")
        .expect(3)
        .create_async()
        .await;

    let err = openai(server.url())
        .complete("q", &CompletionOptions::default(), &CallContext::new())
        .await
        .unwrap_err();

    assert!(matches!(err, LlmError::ApiError(ref msg) if msg.contains("503")));
    mock.assert_async().await;
}

/// Client errors are returned on the first attempt
#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/embeddings")
        .with_status(401)
        .with_body(r#"{"error":{"message":"Incorrect API key"}}"#)
        .expect(1)
        .create_async()
        .await;

    let result = openai(server.url()).embed("toys", &CallContext::new()).await;
    assert!(result.is_err());
    mock.assert_async().await;
}

/// Embedding vectors are decoded from the first data entry
#[tokio::test]
async fn test_embedding() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/embeddings")
        .match_body(Matcher::PartialJson(json!({
            "model": "text-embedding-ada-002",
            "input": "Toys coming alive"
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"data":[{"index":0,"embedding":[0.25,-0.5,1.0]}]}"#)
        .create_async()
        .await;

    let vector = openai(server.url())
        .embed("Toys coming alive", &CallContext::new())
        .await
        .unwrap();
    assert_eq!(vector, vec![0.25, -0.5, 1.0]);
    mock.assert_async().await;
}

/// Rows are zipped with the column header in order
#[tokio::test]
async fn test_neo4j_rows() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/db/neo4j/tx/commit")
        .match_header("authorization", Matcher::Regex("^Basic ".to_string()))
        .match_body(Matcher::PartialJson(json!({
            "statements": [{"statement": "MATCH (m:Movie) RETURN m.title AS title, m.released AS year", "parameters": {"limit": 2}}]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"results":[{"columns":["title","year"],"data":[
                {"row":["The Matrix",1999],"meta":[null,null]},
                {"row":["Heat",1995],"meta":[null,null]}
            ]}],"errors":[]}"#,
        )
        .create_async()
        .await;

    let mut params = Params::new();
    params.insert("limit".to_string(), json!(2));
    let rows = neo4j(server.url())
        .run(
            "MATCH (m:Movie) RETURN m.title AS title, m.released AS year",
            &params,
            &CallContext::new(),
        )
        .await
        .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].keys(), ["title", "year"]);
    assert_eq!(rows[1].get("title"), Some(&json!("Heat")));
    mock.assert_async().await;
}

/// Statement errors keep their Neo4j code and class
#[tokio::test]
async fn test_neo4j_errors() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/db/neo4j/tx/commit")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"results":[],"errors":[{"code":"Neo.ClientError.Statement.SyntaxError","message":"Invalid input 'RETRUN'"}]}"#,
        )
        .create_async()
        .await;

    let store = neo4j(server.url());
    let err = store
        .run("MATCH (n) RETRUN n", &Params::new(), &CallContext::new())
        .await
        .unwrap_err();
    match err {
        StoreError::Syntax { code, message } => {
            assert_eq!(code, "Neo.ClientError.Statement.SyntaxError");
            assert!(message.contains("RETRUN"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

/// Non-2xx replies and closed handles are connection failures
#[tokio::test]
async fn test_neo4j_connection_failures() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/db/neo4j/tx/commit")
        .with_status(503)
        .create_async()
        .await;

    let store = neo4j(server.url());
    let err = store
        .run("RETURN 1", &Params::new(), &CallContext::new())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Connection(_)));

    store.close().await.unwrap();
    let err = store
        .run("RETURN 1", &Params::new(), &CallContext::new())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Connection(ref msg) if msg.contains("closed")));
}
