//! Complexity-based routing of chat completions.
//!
//! `simple` and `medium` prompts are served by the local LM Studio instance
//! and tagged with routing metadata. `complex` prompts never reach a provider:
//! the caller gets a synthesized completion recommending a cloud model.

use crate::core::config::{AppConfig, ChatDefaults};
use crate::core::error::{AppError, Result};
use crate::core::metrics::get_metrics;
use crate::services::classifier::{classify, Classification, ComplexityLabel};
use crate::services::retry::RetryPolicy;
use crate::services::usage::UsageTracker;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Error message for a missing or malformed `messages` array.
pub const INVALID_MESSAGES: &str = "Invalid messages format";

/// Error message for a `max_tokens` that is not a non-negative integer.
pub const INVALID_MAX_TOKENS: &str = "Invalid max_tokens";

/// Model name reported on synthesized completions.
pub const ROUTER_MODEL: &str = "luxrig-router";

pub const LOCAL_COST_SAVINGS: &str = "estimated $0.02";

pub const CLOUD_ESCALATION_MESSAGE: &str = "This request was classified as complex and is better suited for a cloud AI provider. Please retry it with a cloud model for the best results.";

pub const CLOUD_ESCALATION_REASON: &str = "High complexity task requires advanced reasoning capabilities";

/// Where a chat request was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutedTo {
    Local,
    CloudRecommended,
}

impl RoutedTo {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutedTo::Local => "local",
            RoutedTo::CloudRecommended => "cloud_recommended",
        }
    }
}

/// The fields of a chat message that routing reads.
///
/// Other fields (`name`, `tool_calls`, `tool_call_id`, ...) are not modelled
/// here; the raw message is forwarded to LM Studio as received.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    /// Plain string, an array of content parts, or absent on tool-call turns
    #[serde(default)]
    pub content: Value,
}

impl ChatMessage {
    /// Text used for classification.
    ///
    /// Array content contributes its string parts and the `text` of its
    /// object parts, joined with a space.
    pub fn text(&self) -> String {
        match &self.content {
            Value::String(s) => s.clone(),
            Value::Array(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    Value::String(s) => Some(s.as_str()),
                    other => other.get("text").and_then(|t| t.as_str()),
                })
                .collect::<Vec<_>>()
                .join(" "),
            _ => String::new(),
        }
    }
}

/// Validated body of `POST /api/ai/chat`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// Messages exactly as the client sent them
    pub messages: Vec<Value>,
    prompt: String,
    pub model: Option<String>,
    pub max_tokens: Option<u64>,
    pub temperature: Option<f64>,
}

impl ChatRequest {
    /// Validate a raw request body.
    ///
    /// `messages` must be a non-empty array of objects, each with a string
    /// `role`. `max_tokens`, when present, must be a non-negative integer
    /// (`256.0` counts). Other optional fields of the wrong type are ignored.
    pub fn parse(body: &Value) -> Result<Self> {
        let messages = body
            .get("messages")
            .and_then(|m| m.as_array())
            .filter(|m| !m.is_empty())
            .ok_or_else(|| AppError::bad_request(INVALID_MESSAGES))?;

        let typed = messages
            .iter()
            .map(|m| serde_json::from_value::<ChatMessage>(m.clone()))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::bad_request_with(INVALID_MESSAGES, e.to_string()))?;
        let prompt = typed.last().map(ChatMessage::text).unwrap_or_default();

        Ok(Self {
            messages: messages.clone(),
            prompt,
            model: body
                .get("model")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            max_tokens: parse_max_tokens(body.get("max_tokens"))?,
            temperature: body.get("temperature").and_then(|v| v.as_f64()),
        })
    }

    /// Text of the last message, the only one inspected for routing.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }
}

fn parse_max_tokens(value: Option<&Value>) -> Result<Option<u64>> {
    let value = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(v) => v,
    };

    value
        .as_u64()
        .or_else(|| {
            value
                .as_f64()
                .filter(|f| {
                    f.is_finite() && *f >= 0.0 && f.fract() == 0.0 && *f < u64::MAX as f64
                })
                .map(|f| f as u64)
        })
        .map(Some)
        .ok_or_else(|| {
            AppError::bad_request_with(
                INVALID_MAX_TOKENS,
                format!("max_tokens must be a non-negative integer, got {}", value),
            )
        })
}

/// Routes chat requests by prompt complexity.
pub struct ComplexityRouter {
    client: Client,
    completions_url: String,
    defaults: ChatDefaults,
    timeout: Duration,
    retry: RetryPolicy,
    usage: Arc<UsageTracker>,
}

impl ComplexityRouter {
    pub fn new(client: Client, config: &AppConfig, usage: Arc<UsageTracker>) -> Self {
        Self {
            client,
            completions_url: format!(
                "{}/v1/chat/completions",
                config.lm_studio_url.trim_end_matches('/')
            ),
            defaults: config.chat.clone(),
            timeout: config.request_timeout(),
            retry: RetryPolicy::from_config(&config.retry),
            usage,
        }
    }

    pub fn usage(&self) -> &UsageTracker {
        &self.usage
    }

    /// Classify the request and serve it locally or answer with a cloud
    /// recommendation.
    pub async fn route(&self, request: &ChatRequest) -> Result<Value> {
        let classification = classify(request.prompt());
        let label = classification.label;
        self.usage.record_classification(label);

        tracing::info!(
            complexity = %label,
            simple_score = classification.simple_score,
            complex_score = classification.complex_score,
            "Classified chat request"
        );

        if !label.is_local() {
            record_decision(label, RoutedTo::CloudRecommended);
            self.usage.record_cloud_recommendation();
            return Ok(cloud_recommendation(&classification));
        }

        match self.complete_locally(request).await {
            Ok(mut body) => {
                record_decision(label, RoutedTo::Local);
                self.usage.record_local_success();
                if let Some(obj) = body.as_object_mut() {
                    obj.insert("luxrig_metadata".to_string(), local_metadata(label));
                }
                Ok(body)
            }
            Err(e) => {
                self.usage.record_local_failure();
                tracing::warn!(complexity = %label, error = %e, "Local chat completion failed");
                Err(e)
            }
        }
    }

    async fn complete_locally(&self, request: &ChatRequest) -> Result<Value> {
        let payload = json!({
            "model": request.model.as_deref().unwrap_or(&self.defaults.model),
            "messages": request.messages,
            "max_tokens": request.max_tokens.unwrap_or(u64::from(self.defaults.max_tokens)),
            "temperature": request.temperature.unwrap_or(self.defaults.temperature),
            "stream": false,
        });

        let deadline = Instant::now() + self.timeout;
        let response = self
            .retry
            .run(
                deadline,
                |remaining| {
                    self.client
                        .post(&self.completions_url)
                        .json(&payload)
                        .timeout(remaining)
                        .send()
                },
                |e: &reqwest::Error| e.is_connect(),
            )
            .await
            .map_err(local_failure)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::LocalChatFailed(format!(
                "LM Studio error: {}",
                status.as_u16()
            )));
        }

        let body: Value = response.json().await.map_err(local_failure)?;
        if !body.is_object() {
            return Err(AppError::LocalChatFailed(
                "LM Studio returned a non-object response".to_string(),
            ));
        }
        Ok(body)
    }
}

fn local_failure(e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::Timeout
    } else {
        AppError::LocalChatFailed(e.to_string())
    }
}

fn record_decision(label: ComplexityLabel, routed_to: RoutedTo) {
    get_metrics()
        .routing_decisions
        .with_label_values(&[label.as_str(), routed_to.as_str()])
        .inc();
}

fn local_metadata(label: ComplexityLabel) -> Value {
    json!({
        "routed_to": RoutedTo::Local,
        "complexity": label,
        "cost_savings": LOCAL_COST_SAVINGS,
        "response_time": Utc::now().timestamp_millis(),
    })
}

/// Completion-shaped answer for prompts that should go to a cloud model.
fn cloud_recommendation(classification: &Classification) -> Value {
    json!({
        "id": format!("luxrig-{}", uuid::Uuid::new_v4()),
        "object": "chat.completion",
        "created": Utc::now().timestamp(),
        "model": ROUTER_MODEL,
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": CLOUD_ESCALATION_MESSAGE,
            },
            "finish_reason": "stop",
        }],
        "usage": {
            "prompt_tokens": 0,
            "completion_tokens": 0,
            "total_tokens": 0,
        },
        "luxrig_metadata": {
            "routed_to": RoutedTo::CloudRecommended,
            "complexity": classification.label,
            "reason": CLOUD_ESCALATION_REASON,
        },
    })
}
