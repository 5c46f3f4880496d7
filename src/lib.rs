//! LuxRig Bridge - A local-AI request router and proxy bridge
//!
//! This library sits between a browser frontend and LLM runtimes running on
//! the same machine (LM Studio, Ollama) with features including:
//!
//! - **Generic Port Proxy**: Relay any request at `/proxy/{port}/{path}` to
//!   the local provider on that port, streaming bodies in both directions
//! - **Provider Health Checks**: Concurrent short-timeout probes of every
//!   configured provider, memoized briefly with single-flight refresh
//! - **Complexity-Based Routing**: Keyword heuristics decide whether a chat
//!   prompt is served locally or answered with a cloud recommendation
//! - **Metrics & Monitoring**: Prometheus metrics for observability
//! - **Rate Limiting**: Per-client request budget on the `/api/*` surface
//!
//! # Architecture
//!
//! The codebase is organized into three main layers:
//!
//! - [`core`]: Core functionality (config, errors, metrics, middleware, rate limiting)
//! - [`api`]: HTTP handlers, response models, the generic proxy and the router
//! - [`services`]: Business logic (provider registry, health checks, classification, routing)
//!
//! # Configuration
//!
//! All settings have defaults. Optional environment variables:
//! - `CONFIG_PATH`: YAML configuration file
//! - `HOST`: Server bind address (default: 0.0.0.0)
//! - `PROXY_PORT` / `LUXRIG_PORT` / `PORT`: Server port, first set wins (default: 3001)
//! - `LM_STUDIO_URL`: LM Studio base URL (default: http://localhost:1234)
//! - `NODE_ENV` / `APP_ENV`: Environment name (default: development)
//! - `REQUEST_TIMEOUT_SECS`: Upstream request timeout in seconds (default: 30)
//! - `HEALTH_CHECK_TIMEOUT_MS`: Provider probe timeout (default: 2000)

pub mod api;
pub mod core;
pub mod services;

// Re-export commonly used types for convenience
pub use api::{build_router, AppState};
pub use core::{AppConfig, AppError, Result};
pub use services::{classify, ComplexityLabel, ComplexityRouter, HealthCheckService};
