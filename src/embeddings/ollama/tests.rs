use super::*;
use crate::config::{EmbeddingConfig, OllamaConfig};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer, dimension: u32, batch_size: u32) -> Config {
    let uri = Url::parse(&server.uri()).expect("mock server uri should parse");
    Config {
        ollama: OllamaConfig {
            protocol: "http".to_string(),
            host: uri.host_str().unwrap_or("127.0.0.1").to_string(),
            port: uri.port().unwrap_or(80),
        },
        embedding: EmbeddingConfig {
            model: "test-embed".to_string(),
            dimension,
            batch_size,
            ..EmbeddingConfig::default()
        },
        ..Config::default()
    }
}

fn embedder_for(server: &MockServer, dimension: u32, batch_size: u32) -> OllamaEmbedder {
    OllamaEmbedder::new(&config_for(server, dimension, batch_size))
        .expect("should create embedder")
        .with_retry_attempts(1)
        .with_timeout(Duration::from_secs(5))
}

#[test]
fn embedder_configuration() {
    let config = Config {
        ollama: OllamaConfig {
            protocol: "http".to_string(),
            host: "test-host".to_string(),
            port: 1234,
        },
        embedding: EmbeddingConfig {
            model: "test-model".to_string(),
            batch_size: 0,
            ..EmbeddingConfig::default()
        },
        ..Config::default()
    };
    let embedder = OllamaEmbedder::new(&config).expect("should create embedder");

    assert_eq!(embedder.model(), "test-model");
    assert_eq!(embedder.batch_size, 1);
    assert_eq!(embedder.dimension(), 384);
    assert_eq!(embedder.http.base_url().host_str(), Some("test-host"));
    assert_eq!(embedder.http.base_url().port(), Some(1234));
}

#[tokio::test(flavor = "multi_thread")]
async fn encodes_in_input_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_json(json!({"model": "test-embed", "input": ["first", "second"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let embedder = embedder_for(&server, 3, 16);
    let vectors = tokio::task::spawn_blocking(move || {
        embedder.encode(&["first".to_string(), "second".to_string()])
    })
    .await
    .expect("blocking task should join")
    .expect("encode should succeed");

    assert_eq!(vectors, vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]);
}

#[tokio::test(flavor = "multi_thread")]
async fn splits_requests_by_batch_size() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_json(json!({"model": "test-embed", "input": ["a", "b"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[1.0, 1.0], [2.0, 2.0]]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_json(json!({"model": "test-embed", "input": ["c"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[3.0, 3.0]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let embedder = embedder_for(&server, 2, 2);
    let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let vectors = tokio::task::spawn_blocking(move || embedder.encode(&texts))
        .await
        .expect("blocking task should join")
        .expect("encode should succeed");

    assert_eq!(vectors, vec![vec![1.0, 1.0], vec![2.0, 2.0], vec![3.0, 3.0]]);
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_strings_get_zero_vectors_without_a_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_json(json!({"model": "test-embed", "input": ["text"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[0.5, 0.5]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let embedder = embedder_for(&server, 2, 16);
    let texts = vec![String::new(), "text".to_string(), String::new()];
    let vectors = tokio::task::spawn_blocking(move || embedder.encode(&texts))
        .await
        .expect("blocking task should join")
        .expect("encode should succeed");

    assert_eq!(
        vectors,
        vec![vec![0.0, 0.0], vec![0.5, 0.5], vec![0.0, 0.0]]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn only_empty_input_never_contacts_server() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let embedder = embedder_for(&server, 4, 16);
    let vector = tokio::task::spawn_blocking(move || embedder.encode_one(""))
        .await
        .expect("blocking task should join")
        .expect("empty input must not fail");

    assert_eq!(vector, vec![0.0; 4]);
}

#[tokio::test(flavor = "multi_thread")]
async fn rejects_wrong_dimension() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[0.1, 0.2, 0.3]]
        })))
        .mount(&server)
        .await;

    let embedder = embedder_for(&server, 2, 16);
    let result = tokio::task::spawn_blocking(move || embedder.encode_one("query"))
        .await
        .expect("blocking task should join");

    assert!(matches!(
        result,
        Err(EmbeddingError::DimensionMismatch {
            expected: 2,
            actual: 3
        })
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn rejects_missing_embeddings() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[0.1, 0.2]]
        })))
        .mount(&server)
        .await;

    let embedder = embedder_for(&server, 2, 16);
    let texts = vec!["a".to_string(), "b".to_string()];
    let result = tokio::task::spawn_blocking(move || embedder.encode(&texts))
        .await
        .expect("blocking task should join");

    assert!(matches!(
        result,
        Err(EmbeddingError::CountMismatch {
            expected: 2,
            actual: 1
        })
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn backend_failure_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let embedder = embedder_for(&server, 2, 16);
    let result = tokio::task::spawn_blocking(move || embedder.encode_one("query"))
        .await
        .expect("blocking task should join");

    assert!(matches!(
        result,
        Err(EmbeddingError::Backend(OllamaError::Status { status: 503 }))
    ));
}
