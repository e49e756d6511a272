use std::time::Duration;

use ai_client::{AiError, OpenAi, TextGenerator};
use serde_json::json;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion(content: &str) -> serde_json::Value {
    json!({
        "choices": [{
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 12, "completion_tokens": 5, "total_tokens": 17 }
    })
}

#[tokio::test]
async fn generate_returns_trimmed_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("  A rocket launch.\n")))
        .expect(1)
        .mount(&server)
        .await;

    let ai = OpenAi::new("test-key", "gpt-3.5-turbo").with_base_url(server.uri());
    let text = assert_ok!(ai.generate("Summarize").await);

    assert_eq!(text, "A rocket launch.");
}

#[tokio::test]
async fn non_success_status_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let ai = OpenAi::new("test-key", "gpt-3.5-turbo").with_base_url(server.uri());
    let err = ai.generate("Summarize").await.unwrap_err();

    match err {
        AiError::Api { status, body } => {
            assert_eq!(status, 429);
            assert_eq!(body, "slow down");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn blank_completion_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("   ")))
        .mount(&server)
        .await;

    let ai = OpenAi::new("test-key", "gpt-3.5-turbo").with_base_url(server.uri());
    let err = assert_err!(ai.generate("Summarize").await);

    assert!(matches!(err, AiError::EmptyResponse(_)));
}

#[tokio::test]
async fn slow_provider_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("late"))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let ai = OpenAi::new("test-key", "gpt-3.5-turbo")
        .with_base_url(server.uri())
        .with_timeout(Duration::from_millis(200));
    let err = ai.generate("Summarize").await.unwrap_err();

    assert!(matches!(err, AiError::Timeout(_)), "got {err:?}");
}
