//! HTTP request handlers for the bridge's own endpoints.
//!
//! The generic port proxy lives in [`crate::api::proxy`].

use crate::api::models::{
    EndpointNotFoundResponse, ProvidersResponse, ProxyUsageResponse, ServiceHealthResponse,
};
use crate::core::config::AppConfig;
use crate::core::error::{AppError, Result};
use crate::core::rate_limiter::RateLimiter;
use crate::services::router::INVALID_MESSAGES;
use crate::services::{
    ChatRequest, ComplexityRouter, HealthCache, HealthCheckService, ProviderRegistry,
    RetryPolicy, UsageSnapshot, UsageTracker,
};
use axum::{
    body::Bytes,
    extract::{OriginalUri, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use prometheus::{Encoder, TextEncoder};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

pub const SERVER_NAME: &str = "LuxRig Bridge";

pub const PROXY_USAGE: &str = "/proxy/{port}/{path}";

pub const PROXY_EXAMPLE: &str = "/proxy/1234/v1/models";

/// Endpoints advertised on unknown `/api/*` paths.
pub const AVAILABLE_ENDPOINTS: [&str; 8] = [
    "GET /",
    "GET /health",
    "GET /providers",
    "ANY /proxy/{port}/{path}",
    "GET /api/lm-studio/health",
    "POST /api/ai/chat",
    "GET /api/stats/usage",
    "GET /metrics",
];

/// Application state shared across all handlers.
pub struct AppState {
    pub config: AppConfig,
    pub http_client: reqwest::Client,
    pub registry: Arc<ProviderRegistry>,
    pub health: Arc<HealthCheckService>,
    pub health_cache: HealthCache,
    pub router: ComplexityRouter,
    pub rate_limiter: Arc<RateLimiter>,
    /// Retry policy for body-less proxied requests
    pub proxy_retry: RetryPolicy,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: AppConfig, http_client: reqwest::Client) -> Self {
        let registry = Arc::new(ProviderRegistry::from_config(&config));
        let health = Arc::new(HealthCheckService::new(
            http_client.clone(),
            registry.clone(),
            &config,
        ));
        let usage = Arc::new(UsageTracker::new());

        Self {
            health_cache: HealthCache::with_system_clock(config.health_cache_ttl()),
            router: ComplexityRouter::new(http_client.clone(), &config, usage),
            rate_limiter: Arc::new(RateLimiter::new(&config.rate_limit)),
            proxy_retry: RetryPolicy::from_config(&config.retry),
            started_at: Instant::now(),
            registry,
            health,
            http_client,
            config,
        }
    }
}

/// Service health with the configured provider list.
///
/// Served on both `/` and `/health`. Providers are listed, not probed.
pub async fn service_health(State(state): State<Arc<AppState>>) -> Json<ServiceHealthResponse> {
    tracing::debug!("Health check requested");

    Json(ServiceHealthResponse {
        status: "healthy".to_string(),
        server: SERVER_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
        uptime: state.started_at.elapsed().as_secs_f64(),
        luxrig: "online".to_string(),
        environment: state.config.environment.clone(),
        providers: state.registry.summaries(),
    })
}

/// Probe every configured provider, reusing a recent snapshot when fresh.
pub async fn list_providers(State(state): State<Arc<AppState>>) -> Json<ProvidersResponse> {
    let health = state.health.clone();
    let snapshot = state
        .health_cache
        .get_or_refresh(move || async move { health.check_configured().await })
        .await;

    Json(ProvidersResponse {
        providers: snapshot.as_ref().clone(),
    })
}

/// LM Studio availability: 200 when reachable, 503 otherwise.
pub async fn lm_studio_health(State(state): State<Arc<AppState>>) -> Response {
    let health = state.health.check_lm_studio().await;
    let status = if health.available {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(health)).into_response()
}

/// Routed chat completion.
///
/// The body is parsed by hand so malformed JSON gets the same 400 body as a
/// malformed `messages` array.
#[tracing::instrument(skip(state, body), fields(body_len = body.len()))]
pub async fn chat(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Json<Value>> {
    let body: Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::bad_request_with(INVALID_MESSAGES, e.to_string()))?;
    let request = ChatRequest::parse(&body)?;

    state.router.route(&request).await.map(Json)
}

pub async fn usage_stats(State(state): State<Arc<AppState>>) -> Json<UsageSnapshot> {
    Json(state.router.usage().snapshot())
}

/// Prometheus metrics endpoint.
pub async fn metrics_handler() -> Result<Response> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response())
}

/// 404 describing how to address the generic proxy.
pub fn proxy_usage_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ProxyUsageResponse {
            error: "Not Found".to_string(),
            usage: PROXY_USAGE.to_string(),
            example: PROXY_EXAMPLE.to_string(),
        }),
    )
        .into_response()
}

/// Fallback for unmatched routes.
///
/// Uses the original URI so the `/api` prefix is still visible when this runs
/// as the fallback of the nested API router.
pub async fn not_found(OriginalUri(uri): OriginalUri) -> Response {
    let path = uri.path();
    tracing::debug!(path = %path, "No route matched");

    if path == "/api" || path.starts_with("/api/") {
        (
            StatusCode::NOT_FOUND,
            Json(EndpointNotFoundResponse {
                error: "Endpoint not found".to_string(),
                available_endpoints: AVAILABLE_ENDPOINTS.iter().map(|e| e.to_string()).collect(),
            }),
        )
            .into_response()
    } else {
        proxy_usage_not_found()
    }
}
