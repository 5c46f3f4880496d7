//! Core functionality for the LuxRig bridge.
//!
//! This module contains fundamental components used throughout the application:
//! - Configuration management
//! - Error handling
//! - Logging context and metrics collection
//! - HTTP middleware and rate limiting

pub mod cancel;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod rate_limiter;

// Re-export commonly used types
pub use cancel::{CancelHandle, CancelOnDrop};
pub use config::{AppConfig, LocalProviderConfig, ServerConfig};
pub use error::{AppError, Result};
pub use logging::{get_provider_context, get_request_id, PROVIDER_CONTEXT, REQUEST_ID};
pub use metrics::{get_metrics, init_metrics, Metrics};
pub use middleware::{
    cors_layer, handle_panic, rate_limit_middleware, request_id_middleware,
    MetricsMiddleware,
};
pub use rate_limiter::RateLimiter;
