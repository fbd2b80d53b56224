#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Ollama client against a mock server. The client is blocking, so tests run
// on the multi-threaded runtime to keep the mock server responsive.

use ragdocs::config::OllamaConfig;
use ragdocs::embeddings::{Embedder, OllamaClient};
use ragdocs::query::Generator;
use serde_json::json;
use std::fmt::Write as _;
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const EMBED_MODEL: &str = "nomic-embed-text";
const MAIN_MODEL: &str = "llama3.2:latest";

fn client_for(server: &MockServer) -> OllamaClient {
    let address = server.address();
    let config = OllamaConfig {
        protocol: "http".to_string(),
        host: address.ip().to_string(),
        port: address.port(),
        embed_model: EMBED_MODEL.to_string(),
        main_model: MAIN_MODEL.to_string(),
        timeout_seconds: 5,
    };
    OllamaClient::new(&config).expect("Failed to create Ollama client")
}

fn ndjson(lines: &[serde_json::Value]) -> String {
    lines.iter().fold(String::new(), |mut body, line| {
        let _ = writeln!(body, "{line}");
        body
    })
}

#[tokio::test(flavor = "multi_thread")]
async fn embedding_request_and_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .and(body_json(json!({
            "model": EMBED_MODEL,
            "prompt": "Ana won the prize."
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embedding": [0.25, -0.5, 1.0]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let embedding = client
        .embed("Ana won the prize.")
        .expect("embedding should succeed");

    assert_eq!(embedding, vec![0.25, -0.5, 1.0]);
}

#[tokio::test(flavor = "multi_thread")]
async fn embedding_error_carries_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": "model \"nomic-embed-text\" not found, try pulling it first"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let error = client
        .generate_embedding("text")
        .expect_err("missing model should fail");

    let message = format!("{error:#}");
    assert!(message.contains("HTTP 404"), "unexpected error: {message}");
    assert!(message.contains("try pulling it first"));
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_embedding_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "embedding": [] })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert!(client.generate_embedding("text").is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn streamed_generation_in_order() {
    let server = MockServer::start().await;
    let body = ndjson(&[
        json!({"model": MAIN_MODEL, "response": "Hel", "done": false}),
        json!({"model": MAIN_MODEL, "response": "lo", "done": false}),
        json!({"model": MAIN_MODEL, "response": "", "done": false}),
        json!({"model": MAIN_MODEL, "response": " world", "done": false}),
        json!({"model": MAIN_MODEL, "response": "", "done": true, "done_reason": "stop"}),
    ]);
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({
            "model": MAIN_MODEL,
            "prompt": "Say hello",
            "stream": true
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/x-ndjson")
                .set_body_string(body),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let fragments: Vec<String> = client
        .generate("Say hello")
        .expect("generation should start")
        .collect::<anyhow::Result<_>>()
        .expect("stream should parse");

    assert_eq!(fragments.concat(), "Hello world");
    assert_eq!(fragments.len(), 5);
}

#[tokio::test(flavor = "multi_thread")]
async fn generation_error_line_ends_stream() {
    let server = MockServer::start().await;
    let body = ndjson(&[
        json!({"response": "Par", "done": false}),
        json!({"error": "model ran out of memory"}),
        json!({"response": "never", "done": false}),
    ]);
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut stream = client.generate_stream("prompt").expect("should start");

    assert_eq!(stream.next().expect("first item").expect("fragment"), "Par");
    let error = stream
        .next()
        .expect("second item")
        .expect_err("error line should fail");
    assert!(error.to_string().contains("out of memory"));
    assert!(stream.next().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn generation_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"error": "unexpected EOF"})),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let error = client
        .generate_stream("prompt")
        .err()
        .expect("server error should fail");
    assert!(error.to_string().contains("unexpected EOF"));
}

#[tokio::test(flavor = "multi_thread")]
async fn health_check_finds_untagged_models() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                {"name": "nomic-embed-text:latest", "size": 274302450, "digest": "abc"},
                {"name": "llama3.2:latest", "size": 2019393189, "digest": "def"}
            ]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    client
        .health_check(true)
        .expect("both models should be found");

    let models = client.list_models().expect("should list models");
    assert_eq!(models.len(), 2);
    assert_eq!(models[0].size, Some(274_302_450));
}

#[tokio::test(flavor = "multi_thread")]
async fn health_check_reports_missing_model() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{"name": "llama3.2:latest"}]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    client
        .health_check(false)
        .expect("main model alone is available");
    let error = client
        .health_check(true)
        .expect_err("embedding model is missing");
    assert!(error.to_string().contains(EMBED_MODEL));
}
