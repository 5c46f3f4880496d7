//! End-to-end tests for complexity-based chat routing.
//!
//! LM Studio is mocked with wiremock. Complex prompts and malformed bodies
//! must never reach it.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use luxrig_bridge::{build_router, core::init_metrics, AppConfig, AppState};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::{
    matchers::{body_partial_json, method, path},
    Mock, MockServer, ResponseTemplate,
};

const COMPLEX_PROMPT: &str =
    "Please analyze this complex architecture and give a detailed research strategy";

fn create_test_app(lm_studio_url: &str) -> Router {
    init_metrics();

    let mut config = AppConfig::default();
    config.lm_studio_url = lm_studio_url.to_string();
    config.request_timeout_secs = 1;
    config.retry.backoff_ms = 10;

    let state = AppState::new(config, reqwest::Client::new());
    build_router(Arc::new(state))
}

fn chat_request(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/ai/chat")
        .header("content-type", "application/json")
        .header("origin", "http://localhost:5173")
        .body(body.into())
        .unwrap()
}

fn prompt_body(prompt: &str) -> String {
    json!({"messages": [{"role": "user", "content": prompt}]}).to_string()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn lm_studio_completion() -> Value {
    json!({
        "id": "chatcmpl-local",
        "object": "chat.completion",
        "model": "qwen2.5-7b",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": "Hi there"},
            "finish_reason": "stop"
        }]
    })
}

#[tokio::test]
async fn test_simple_prompt_is_served_locally() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "model": "local-model",
            "max_tokens": 1000,
            "stream": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(lm_studio_completion()))
        .expect(1)
        .mount(&server)
        .await;

    let response = create_test_app(&server.uri())
        .oneshot(chat_request(prompt_body("hello, quick test")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["id"], "chatcmpl-local");
    assert_eq!(json["choices"][0]["message"]["content"], "Hi there");
    assert_eq!(json["luxrig_metadata"]["routed_to"], "local");
    assert_eq!(json["luxrig_metadata"]["complexity"], "simple");
    assert_eq!(json["luxrig_metadata"]["cost_savings"], "estimated $0.02");
    assert!(json["luxrig_metadata"]["response_time"].is_i64());
}

#[tokio::test]
async fn test_medium_prompt_forwards_client_overrides() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "model": "qwen2.5-7b",
            "max_tokens": 64,
            "temperature": 0.2
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(lm_studio_completion()))
        .expect(1)
        .mount(&server)
        .await;

    let body = json!({
        "messages": [{"role": "user", "content": "What is the capital of France?"}],
        "model": "qwen2.5-7b",
        "max_tokens": 64,
        "temperature": 0.2
    });
    let response = create_test_app(&server.uri())
        .oneshot(chat_request(body.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["luxrig_metadata"]["complexity"],
        "medium"
    );
}

#[tokio::test]
async fn test_tool_call_conversation_reaches_lm_studio_intact() {
    let messages = json!([
        {"role": "user", "content": "hello, what is the weather", "name": "bob"},
        {"role": "assistant", "tool_calls": [
            {"id": "call_1", "type": "function", "function": {"name": "weather", "arguments": "{}"}}
        ]},
        {"role": "tool", "tool_call_id": "call_1", "content": "sunny"}
    ]);

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "messages": messages.clone(),
            "max_tokens": 256
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(lm_studio_completion()))
        .expect(1)
        .mount(&server)
        .await;

    let body = json!({"messages": messages, "max_tokens": 256.0});
    let response = create_test_app(&server.uri())
        .oneshot(chat_request(body.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["luxrig_metadata"]["routed_to"],
        "local"
    );
}

#[tokio::test]
async fn test_negative_max_tokens_returns_400() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let body = json!({
        "messages": [{"role": "user", "content": "hello"}],
        "max_tokens": -5
    });
    let response = create_test_app(&server.uri())
        .oneshot(chat_request(body.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Invalid max_tokens");
}

#[tokio::test]
async fn test_complex_prompt_gets_cloud_recommendation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(lm_studio_completion()))
        .expect(0)
        .mount(&server)
        .await;

    let response = create_test_app(&server.uri())
        .oneshot(chat_request(prompt_body(COMPLEX_PROMPT)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["id"].as_str().unwrap().starts_with("luxrig-"));
    assert_eq!(json["object"], "chat.completion");
    assert_eq!(json["model"], "luxrig-router");
    assert_eq!(json["choices"][0]["message"]["role"], "assistant");
    assert_eq!(json["choices"][0]["finish_reason"], "stop");
    assert_eq!(json["usage"]["total_tokens"], 0);
    assert_eq!(json["luxrig_metadata"]["routed_to"], "cloud_recommended");
    assert_eq!(json["luxrig_metadata"]["complexity"], "complex");
    assert!(json["luxrig_metadata"]["reason"].is_string());
}

#[tokio::test]
async fn test_long_prompt_without_keywords_is_complex() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let prompt = "a".repeat(501);
    let response = create_test_app(&server.uri())
        .oneshot(chat_request(prompt_body(&prompt)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["luxrig_metadata"]["routed_to"],
        "cloud_recommended"
    );
}

#[tokio::test]
async fn test_invalid_bodies_return_400_without_upstream_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let app = create_test_app(&server.uri());
    let bodies = [
        json!({}).to_string(),
        json!({"messages": []}).to_string(),
        json!({"messages": "hello"}).to_string(),
        json!({"messages": [{"content": "no role"}]}).to_string(),
        "not json".to_string(),
    ];

    for body in bodies {
        let response = app.clone().oneshot(chat_request(body.clone())).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
        assert_eq!(
            body_json(response).await["error"],
            "Invalid messages format",
            "body: {}",
            body
        );
    }
}

#[tokio::test]
async fn test_local_failure_returns_500_with_fallback_hint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
        .expect(1)
        .mount(&server)
        .await;

    let response = create_test_app(&server.uri())
        .oneshot(chat_request(prompt_body("hello")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Local AI processing failed");
    assert_eq!(json["details"], "LM Studio error: 500");
    assert_eq!(json["fallback"], "Try cloud provider");
}

#[tokio::test]
async fn test_slow_local_provider_returns_504() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(lm_studio_completion())
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let response = create_test_app(&server.uri())
        .oneshot(chat_request(prompt_body("hello")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
}

#[tokio::test]
async fn test_usage_stats_reflect_routing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(lm_studio_completion()))
        .mount(&server)
        .await;

    let app = create_test_app(&server.uri());
    for prompt in ["hello", COMPLEX_PROMPT] {
        let response = app.clone().oneshot(chat_request(prompt_body(prompt))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/stats/usage")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["total_requests"], 2);
    assert_eq!(json["local_requests"], 1);
    assert_eq!(json["cloud_recommendations"], 1);
    assert_eq!(json["by_complexity"]["simple"], 1);
    assert_eq!(json["by_complexity"]["complex"], 1);
}
