//! Health probes for local AI providers.
//!
//! Each provider is probed with a short-timeout `GET {endpoint}/models`.
//! Probes fan out concurrently and resolve independently: a slow or dead
//! provider never delays or fails the report for another one.

use crate::core::config::{AppConfig, LocalProviderConfig};
use crate::core::metrics::get_metrics;
use crate::services::registry::ProviderRegistry;
use crate::services::retry::RetryPolicy;
use futures::future::join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Reachability of a local provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderStatus {
    /// Probe answered HTTP 200
    Connected,
    /// Probe answered with another status
    Error,
    /// No response before the timeout, or the connection failed
    Disconnected,
}

impl ProviderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderStatus::Connected => "connected",
            ProviderStatus::Error => "error",
            ProviderStatus::Disconnected => "disconnected",
        }
    }
}

/// Result of probing one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub name: String,
    pub endpoint: String,
    pub status: ProviderStatus,
    /// Round-trip time in milliseconds, present when a response arrived
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<u64>,
}

/// Availability of the LM Studio instance used for routed chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LmStudioHealth {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LmStudioHealth {
    fn available(models: usize, endpoint: String) -> Self {
        Self {
            available: true,
            models: Some(models),
            endpoint: Some(endpoint),
            error: None,
        }
    }

    fn unavailable(error: impl Into<String>) -> Self {
        Self {
            available: false,
            models: None,
            endpoint: None,
            error: Some(error.into()),
        }
    }
}

/// Service for checking provider health
pub struct HealthCheckService {
    client: Client,
    registry: Arc<ProviderRegistry>,
    lm_studio_url: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl HealthCheckService {
    /// Create a new health check service
    ///
    /// Probe timeout, retry count and the LM Studio URL come from `config`.
    /// Retries back off from a tenth of the probe timeout and never extend a
    /// probe past its timeout.
    pub fn new(client: Client, registry: Arc<ProviderRegistry>, config: &AppConfig) -> Self {
        let timeout = config.health_timeout();
        Self {
            client,
            registry,
            lm_studio_url: config.lm_studio_url.trim_end_matches('/').to_string(),
            timeout,
            retry: RetryPolicy::new(config.health.retries, timeout / 10),
        }
    }

    /// Probe one provider.
    pub async fn check_provider(&self, provider: &LocalProviderConfig) -> ProviderHealth {
        let endpoint = self.registry.endpoint(provider);
        let url = format!("{}/models", endpoint);
        let start = Instant::now();
        let deadline = start + self.timeout;

        let result = self
            .retry
            .run(
                deadline,
                |remaining| self.client.get(&url).timeout(remaining).send(),
                |e: &reqwest::Error| e.is_connect(),
            )
            .await;

        let metrics = get_metrics();
        let (status, latency) = match result {
            Ok(response) => {
                let elapsed = start.elapsed();
                metrics
                    .provider_latency
                    .with_label_values(&[&provider.name])
                    .observe(elapsed.as_secs_f64());

                let status = if response.status().as_u16() == 200 {
                    ProviderStatus::Connected
                } else {
                    tracing::debug!(
                        provider = %provider.name,
                        status = response.status().as_u16(),
                        "Provider answered health probe with non-200 status"
                    );
                    ProviderStatus::Error
                };
                (status, Some(elapsed.as_millis() as u64))
            }
            Err(e) => {
                tracing::debug!(provider = %provider.name, error = %e, "Provider health probe failed");
                (ProviderStatus::Disconnected, None)
            }
        };

        metrics
            .provider_health
            .with_label_values(&[&provider.name])
            .set(if status == ProviderStatus::Connected { 1.0 } else { 0.0 });

        ProviderHealth {
            name: provider.name.clone(),
            endpoint,
            status,
            latency,
        }
    }

    /// Probe every provider concurrently. Results keep the input order.
    pub async fn check_all(&self, providers: &[LocalProviderConfig]) -> Vec<ProviderHealth> {
        join_all(providers.iter().map(|p| self.check_provider(p))).await
    }

    /// Probe every configured provider.
    pub async fn check_configured(&self) -> Vec<ProviderHealth> {
        self.check_all(self.registry.providers()).await
    }

    /// Probe the LM Studio model listing used by routed chat.
    pub async fn check_lm_studio(&self) -> LmStudioHealth {
        let url = format!("{}/v1/models", self.lm_studio_url);

        let response = match self.client.get(&url).timeout(self.timeout).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "LM Studio health check failed");
                return LmStudioHealth::unavailable(e.to_string());
            }
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            tracing::warn!(status, "LM Studio health check returned error status");
            return LmStudioHealth::unavailable(format!("HTTP {}", status));
        }

        match response.json::<Value>().await {
            Ok(body) => {
                let models = body
                    .get("data")
                    .and_then(|d| d.as_array())
                    .map(|d| d.len())
                    .unwrap_or(0);
                LmStudioHealth::available(models, self.lm_studio_url.clone())
            }
            Err(e) => LmStudioHealth::unavailable(format!("Invalid model listing: {}", e)),
        }
    }
}
