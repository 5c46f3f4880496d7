//! API layer for the LuxRig bridge.
//!
//! This module contains the HTTP handlers, response models, the generic
//! port proxy and the router that wires them to the middleware stack.

pub mod disconnect;
pub mod handlers;
pub mod models;
pub mod proxy;

use crate::core::{
    cors_layer, handle_panic, rate_limit_middleware, request_id_middleware,
    MetricsMiddleware,
};
use axum::{
    middleware,
    routing::{any, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

// Re-export commonly used types
pub use handlers::{
    chat, list_providers, lm_studio_health, metrics_handler, not_found, service_health,
    usage_stats, AppState,
};
pub use models::{ProvidersResponse, ServiceHealthResponse};
pub use proxy::proxy_handler;

/// Build the router with all endpoints and middleware.
///
/// `/api/*` routes (including their 404 fallback) are rate limited per
/// client. CORS is the outermost layer so every response, errors and panics
/// included, carries `Access-Control-Allow-Origin: *`.
pub fn build_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/lm-studio/health", get(lm_studio_health))
        .route("/ai/chat", post(chat))
        .route("/stats/usage", get(usage_stats))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ));

    Router::new()
        .route("/", get(service_health))
        .route("/health", get(service_health))
        .route("/providers", get(list_providers))
        .route("/proxy/*rest", any(proxy_handler))
        .route("/metrics", get(metrics_handler))
        .nest("/api", api_routes)
        .fallback(not_found)
        .with_state(state)
        .layer(middleware::from_fn(MetricsMiddleware::track_metrics))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
}
