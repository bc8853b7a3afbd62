//! OpenRouter client tests against a mock HTTP server.

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rescue_core::models::{FailureConclusion, FailureRecord};
use rescue_llm::OpenRouterClient;

fn failure() -> FailureRecord {
    FailureRecord {
        job_name: "test-job".to_string(),
        step_name: "test-step".to_string(),
        conclusion: FailureConclusion::Failure,
        logs: "ERROR: something broke".to_string(),
    }
}

#[tokio::test]
async fn test_analyze_failure_returns_model_content() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [
                {"message": {"role": "assistant", "content": "Test analysis result"}}
            ]
        })))
        .mount(&server)
        .await;

    let client = OpenRouterClient::new("test-key", "test-model").with_base_url(&server.uri());
    let analysis = client.analyze_failure(&failure(), 500).await;

    assert_eq!(analysis, "Test analysis result");
}

#[tokio::test]
async fn test_analyze_failure_degrades_on_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let client = OpenRouterClient::new("test-key", "test-model").with_base_url(&server.uri());
    let analysis = client.analyze_failure(&failure(), 500).await;

    assert!(analysis.starts_with("🚨 **CI Failure Analysis**"));
    assert!(analysis.contains("Failed to analyze the error with AI"));
    assert!(analysis.contains("`test-job`"));
}

#[tokio::test]
async fn test_analyze_failure_degrades_on_empty_choices() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let client = OpenRouterClient::new("test-key", "test-model").with_base_url(&server.uri());
    let analysis = client.analyze_failure(&failure(), 500).await;

    assert!(analysis.contains("Manual Review Needed"));
}
