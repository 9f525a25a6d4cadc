use std::time::Duration;

use llm_provider::{CompletionOptions, CompletionProvider, LlmError, OllamaConfig, OllamaProvider};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider_for(server: &MockServer) -> OllamaProvider {
    OllamaProvider::new(OllamaConfig {
        base_url: server.uri(),
        timeout: Duration::from_secs(5),
        ..OllamaConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn sends_generate_request_and_returns_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(serde_json::json!({
            "model": "qwen2.5-coder:7b",
            "stream": false,
            "options": {"num_predict": 400}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": "qwen2.5-coder:7b",
            "response": "{\"candidateId\": \"candidate_0\"}",
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let text = provider_for(&server)
        .complete("pick one", &CompletionOptions::default())
        .await
        .unwrap();
    assert_eq!(text, "{\"candidateId\": \"candidate_0\"}");
}

#[tokio::test]
async fn server_error_is_reported_as_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(503).set_body_string("model loading"))
        .mount(&server)
        .await;

    let err = provider_for(&server)
        .complete("pick one", &CompletionOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::Http { status: 503, .. }));
    assert!(err.is_unavailable());
}

#[tokio::test]
async fn blank_response_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"response": "  "})))
        .mount(&server)
        .await;

    let err = provider_for(&server)
        .complete("pick one", &CompletionOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::EmptyResponse));
}

#[tokio::test]
async fn unreachable_endpoint_is_unavailable() {
    let provider = OllamaProvider::new(OllamaConfig {
        base_url: "http://127.0.0.1:9".into(),
        timeout: Duration::from_secs(2),
        ..OllamaConfig::default()
    })
    .unwrap();
    let err = provider
        .complete("pick one", &CompletionOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::Unavailable(_)));
}
