//! API response models.
//!
//! This module defines the JSON bodies returned by the bridge's own
//! endpoints. Chat completions and proxied responses are passed through as
//! untyped JSON and are not modelled here.

use crate::services::{ProviderHealth, ProviderSummary};
use serde::{Deserialize, Serialize};

/// Body of `GET /` and `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealthResponse {
    /// Always "healthy" while the process serves requests
    pub status: String,

    pub server: String,

    pub version: String,

    /// RFC 3339 timestamp of the response
    pub timestamp: String,

    /// Seconds since startup
    pub uptime: f64,

    /// Always "online"
    pub luxrig: String,

    pub environment: String,

    pub providers: Vec<ProviderSummary>,
}

/// Body of `GET /providers`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersResponse {
    pub providers: Vec<ProviderHealth>,
}

/// 404 body for paths outside the proxy and API surfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyUsageResponse {
    pub error: String,
    pub usage: String,
    pub example: String,
}

/// 404 body for unknown `/api/*` paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointNotFoundResponse {
    pub error: String,
    pub available_endpoints: Vec<String>,
}
