#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Tests against a mocked Ollama server

use course_vectors::config::OllamaConfig;
use course_vectors::embeddings::{Embedder, OllamaClient};
use course_vectors::indexer::{DocumentChunk, DocumentIndexer};
use course_vectors::store::FileVectorStore;
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_MODEL: &str = "nomic-embed-text:latest";

fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok();
}

fn create_client(server: &MockServer, batch_size: u32, retry_attempts: u32) -> OllamaClient {
    init_test_tracing();
    let address = server.address();
    let config = OllamaConfig {
        host: address.ip().to_string(),
        port: address.port(),
        model: TEST_MODEL.to_string(),
        batch_size,
        ..OllamaConfig::default()
    };

    OllamaClient::new(&config)
        .expect("Failed to create Ollama client")
        .with_timeout(Duration::from_secs(5))
        .with_retry_attempts(retry_attempts)
}

#[tokio::test(flavor = "multi_thread")]
async fn embed_batch_posts_inputs() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(
            json!({ "model": TEST_MODEL, "input": ["alpha", "beta"] }),
        ))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "embeddings": [[0.1, 0.2], [0.3, 0.4]] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = create_client(&server, 16, 1);
    let vectors = client
        .embed_batch(&["alpha".to_string(), "beta".to_string()])
        .await
        .expect("can embed");

    assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
}

#[tokio::test(flavor = "multi_thread")]
async fn large_inputs_are_split_by_batch_size() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({ "input": ["one", "two"] })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[1.0], [2.0]] })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({ "input": ["three"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[3.0]] })))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_client(&server, 2, 1);
    let texts = vec!["one".to_string(), "two".to_string(), "three".to_string()];
    let vectors = client.embed_batch(&texts).await.expect("can embed");

    assert_eq!(vectors, vec![vec![1.0], vec![2.0], vec![3.0]]);
}

#[tokio::test(flavor = "multi_thread")]
async fn single_embed_uses_batch_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({ "input": ["query"] })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[0.5, 0.5]] })),
        )
        .mount(&server)
        .await;

    let client = create_client(&server, 16, 1);
    let vector = client.embed("query").await.expect("can embed");

    assert_eq!(vector, vec![0.5, 0.5]);
}

#[tokio::test(flavor = "multi_thread")]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": "model not found" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_client(&server, 16, 3);
    let result = client.embed("anything").await;

    assert!(result.is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let client = create_client(&server, 16, 2);
    let result = client.embed("anything").await;

    assert!(result.is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn short_response_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[1.0]] })))
        .mount(&server)
        .await;

    let client = create_client(&server, 16, 1);
    let result = client
        .embed_batch(&["a".to_string(), "b".to_string()])
        .await;

    assert!(result.is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn health_check_requires_configured_model() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                { "name": TEST_MODEL, "size": 274_302_450_u64, "digest": "0a109f422b47" },
                { "name": "llama3:8b" },
            ]
        })))
        .mount(&server)
        .await;

    let client = create_client(&server, 16, 1);
    let other = client.clone();
    let models = tokio::task::spawn_blocking(move || other.list_models())
        .await
        .expect("task completes")
        .expect("can list models");
    assert_eq!(models.len(), 2);
    assert_eq!(models[0].size, Some(274_302_450));

    let result = tokio::task::spawn_blocking(move || client.health_check())
        .await
        .expect("task completes");
    assert!(result.is_ok(), "health check failed: {:?}", result);
}

#[tokio::test(flavor = "multi_thread")]
async fn health_check_fails_without_model() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "models": [{ "name": "llama3:8b" }] })),
        )
        .mount(&server)
        .await;

    let client = create_client(&server, 16, 1);
    let result = tokio::task::spawn_blocking(move || client.health_check())
        .await
        .expect("task completes");

    assert!(result.is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn index_and_search_through_ollama() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({ "input": ["borrowing rules", "lifetimes"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({ "input": ["what is borrowing"] })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[0.9, 0.1, 0.0]] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = FileVectorStore::open(temp_dir.path()).expect("can open store");
    let indexer = DocumentIndexer::new(store, create_client(&server, 16, 1));

    let ids = indexer
        .index_document(
            vec![
                DocumentChunk::new("borrowing rules"),
                DocumentChunk::new("lifetimes"),
            ],
            "rust-101",
            "week3",
            Some("Rust 101"),
        )
        .await
        .expect("can index");
    assert_eq!(ids.len(), 2);
    assert!(temp_dir.path().join("Rust_101").join("week3.json").is_file());

    let report = indexer
        .search("what is borrowing", "rust-101", 10, 0.7)
        .await
        .expect("can search");
    assert_eq!(report.ids(), vec![ids[0].as_str()]);
    assert_eq!(report.hits[0].payload.content, "borrowing rules");
}
