//! Registry of local AI providers and proxy path resolution.
//!
//! The provider list is injected from configuration so tests can point the
//! registry at fake ports.

use crate::core::config::{AppConfig, LocalProviderConfig};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Name reported for proxied ports that match no configured provider.
pub const UNKNOWN_PROVIDER: &str = "Unknown";

static PROXY_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/proxy/(\d+)(/.*)?$").expect("valid proxy path pattern"));

/// Provider name and base endpoint, as listed on the health endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSummary {
    pub name: String,
    pub endpoint: String,
}

/// Destination of a proxied request, resolved from `/proxy/{port}/{path}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyTarget {
    pub port: u16,
    /// Path on the local provider, always starting with `/`
    pub path: String,
    pub query: Option<String>,
    /// Configured provider name, or [`UNKNOWN_PROVIDER`]
    pub provider: String,
}

#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: Vec<LocalProviderConfig>,
    upstream_host: String,
}

impl ProviderRegistry {
    pub fn new(providers: Vec<LocalProviderConfig>, upstream_host: impl Into<String>) -> Self {
        Self {
            providers,
            upstream_host: upstream_host.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.providers.clone(), config.upstream_host.clone())
    }

    pub fn providers(&self) -> &[LocalProviderConfig] {
        &self.providers
    }

    /// Name of the provider configured on `port`, or `Unknown`.
    pub fn provider_name(&self, port: u16) -> &str {
        self.providers
            .iter()
            .find(|p| p.port == port)
            .map(|p| p.name.as_str())
            .unwrap_or(UNKNOWN_PROVIDER)
    }

    /// Base endpoint of a provider, e.g. `http://localhost:1234/v1`.
    pub fn endpoint(&self, provider: &LocalProviderConfig) -> String {
        format!(
            "http://{}:{}{}",
            self.upstream_host, provider.port, provider.path
        )
    }

    pub fn summaries(&self) -> Vec<ProviderSummary> {
        self.providers
            .iter()
            .map(|p| ProviderSummary {
                name: p.name.clone(),
                endpoint: self.endpoint(p),
            })
            .collect()
    }

    /// Resolve an inbound path of the form `/proxy/{port}[/{rest}]`.
    ///
    /// Returns `None` when the path does not match or the port is not a
    /// valid TCP port.
    pub fn parse_proxy_path(&self, path: &str, query: Option<&str>) -> Option<ProxyTarget> {
        let caps = PROXY_PATH.captures(path)?;
        let port = caps[1].parse::<u16>().ok().filter(|p| *p != 0)?;
        let rest = caps.get(2).map(|m| m.as_str()).unwrap_or("/");

        Some(ProxyTarget {
            port,
            path: rest.to_string(),
            query: query.filter(|q| !q.is_empty()).map(|q| q.to_string()),
            provider: self.provider_name(port).to_string(),
        })
    }

    /// Full upstream URL for a proxy target, query string included.
    pub fn target_url(&self, target: &ProxyTarget) -> String {
        let mut url = format!("http://{}:{}{}", self.upstream_host, target.port, target.path);
        if let Some(query) = &target.query {
            url.push('?');
            url.push_str(query);
        }
        url
    }
}
