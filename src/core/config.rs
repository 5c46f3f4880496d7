//! Configuration management for the LuxRig bridge.
//!
//! Configuration comes from built-in defaults, an optional YAML file (with
//! environment variable expansion) and environment variable overrides, in
//! that order of precedence.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port)
    #[serde(default)]
    pub server: ServerConfig,

    /// Deployment environment name (development, production, ...)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Local AI runtimes reachable through the proxy and health checks
    #[serde(default = "default_providers")]
    pub providers: Vec<LocalProviderConfig>,

    /// Host used when building upstream URLs for local providers
    #[serde(default = "default_upstream_host")]
    pub upstream_host: String,

    /// Base URL of the LM Studio instance used for routed chat
    #[serde(default = "default_lm_studio_url")]
    pub lm_studio_url: String,

    /// Upper bound for a proxied or routed upstream call, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Health check settings
    #[serde(default)]
    pub health: HealthConfig,

    /// Retry settings for upstream calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Per-client rate limiting on `/api/*`
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Defaults applied to routed chat requests
    #[serde(default)]
    pub chat: ChatDefaults,
}

/// A local AI runtime identified by port and API base path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalProviderConfig {
    /// Display name (e.g. "LM Studio")
    pub name: String,

    /// Loopback port the runtime listens on
    pub port: u16,

    /// API base path (e.g. "/v1")
    #[serde(default)]
    pub path: String,
}

impl LocalProviderConfig {
    pub fn new(name: impl Into<String>, port: u16, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            port,
            path: path.into(),
        }
    }
}

/// Server-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Health probe configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Timeout for a single provider probe, in milliseconds
    #[serde(default = "default_health_timeout_ms")]
    pub timeout_ms: u64,

    /// How long a health snapshot may be reused, in milliseconds (0 disables reuse)
    #[serde(default = "default_health_cache_ttl_ms")]
    pub cache_ttl_ms: u64,

    /// Extra probe attempts after a transport failure
    #[serde(default)]
    pub retries: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_health_timeout_ms(),
            cache_ttl_ms: default_health_cache_ttl_ms(),
            retries: 0,
        }
    }
}

/// Retry configuration for upstream calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Extra attempts after a connection failure
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff before the first retry, in milliseconds
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

/// Fixed-budget rate limiting per client address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests allowed per window
    #[serde(default = "default_rate_limit_max")]
    pub max_requests: u32,

    /// Window length in seconds
    #[serde(default = "default_rate_limit_window")]
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_rate_limit_max(),
            window_secs: default_rate_limit_window(),
        }
    }
}

/// Values used when a chat request omits them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatDefaults {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

impl Default for ChatDefaults {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_providers() -> Vec<LocalProviderConfig> {
    vec![
        LocalProviderConfig::new("LM Studio", 1234, "/v1"),
        LocalProviderConfig::new("Ollama", 11434, "/v1"),
    ]
}

fn default_upstream_host() -> String {
    "localhost".to_string()
}

fn default_lm_studio_url() -> String {
    "http://localhost:1234".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_health_timeout_ms() -> u64 {
    2000
}

fn default_health_cache_ttl_ms() -> u64 {
    5000
}

fn default_max_retries() -> u32 {
    1
}

fn default_backoff_ms() -> u64 {
    200
}

fn default_rate_limit_max() -> u32 {
    100
}

fn default_rate_limit_window() -> u64 {
    15 * 60
}

fn default_model() -> String {
    "local-model".to_string()
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f64 {
    0.7
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            environment: default_environment(),
            providers: default_providers(),
            upstream_host: default_upstream_host(),
            lm_studio_url: default_lm_studio_url(),
            request_timeout_secs: default_request_timeout(),
            health: HealthConfig::default(),
            retry: RetryConfig::default(),
            rate_limit: RateLimitConfig::default(),
            chat: ChatDefaults::default(),
        }
    }
}

impl AppConfig {
    /// Build configuration from defaults and environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = AppConfig::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration from a YAML file.
    ///
    /// `${VAR}`, `${VAR:-default}` and `${VAR:default}` references are
    /// expanded before parsing, then environment overrides are applied.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use luxrig_bridge::core::config::AppConfig;
    ///
    /// let config = AppConfig::load("luxrig.yaml").expect("Failed to load config");
    /// ```
    pub fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let expanded = expand_env_vars(&content);

        let mut config: AppConfig = serde_yaml::from_str(&expanded)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment variable overrides (env vars take precedence).
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("HOST") {
            self.server.host = host;
        }

        // PROXY_PORT wins over LUXRIG_PORT, which wins over PORT
        if let Some(port) = first_env(&["PROXY_PORT", "LUXRIG_PORT", "PORT"]) {
            self.server.port = port
                .parse()
                .with_context(|| format!("Invalid listen port: {}", port))?;
        }

        if let Some(env) = first_env(&["APP_ENV", "NODE_ENV"]) {
            self.environment = env;
        }

        if let Ok(url) = std::env::var("LM_STUDIO_URL") {
            self.lm_studio_url = url.trim_end_matches('/').to_string();
        }

        if let Ok(host) = std::env::var("UPSTREAM_HOST") {
            self.upstream_host = host;
        }

        parse_env("REQUEST_TIMEOUT_SECS", &mut self.request_timeout_secs)?;
        parse_env("HEALTH_CHECK_TIMEOUT_MS", &mut self.health.timeout_ms)?;
        parse_env("HEALTH_CACHE_TTL_MS", &mut self.health.cache_ttl_ms)?;
        parse_env("HEALTH_CHECK_RETRIES", &mut self.health.retries)?;
        parse_env("UPSTREAM_MAX_RETRIES", &mut self.retry.max_retries)?;
        parse_env("UPSTREAM_RETRY_BACKOFF_MS", &mut self.retry.backoff_ms)?;
        parse_env("RATE_LIMIT_MAX_REQUESTS", &mut self.rate_limit.max_requests)?;
        parse_env("RATE_LIMIT_WINDOW_SECS", &mut self.rate_limit.window_secs)?;
        parse_env("DEFAULT_MAX_TOKENS", &mut self.chat.max_tokens)?;
        parse_env("DEFAULT_TEMPERATURE", &mut self.chat.temperature)?;

        if let Ok(model) = std::env::var("DEFAULT_MODEL") {
            self.chat.model = model;
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health.timeout_ms)
    }

    pub fn health_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.health.cache_ttl_ms)
    }
}

fn first_env(names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| std::env::var(name).ok().filter(|v| !v.trim().is_empty()))
}

fn parse_env<T>(name: &str, target: &mut T) -> Result<()>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if let Ok(raw) = std::env::var(name) {
        *target = raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {}", name, raw))?;
    }
    Ok(())
}

static ENV_VAR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-?([^}]*))?\}").expect("valid env var pattern")
});

/// Expand environment variables in configuration content.
///
/// Supports patterns: ${VAR}, ${VAR:-default}, ${VAR:default}
fn expand_env_vars(content: &str) -> String {
    ENV_VAR_PATTERN
        .replace_all(content, |caps: &regex::Captures| {
            let default_value = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            std::env::var(&caps[1]).unwrap_or_else(|_| default_value.to_string())
        })
        .to_string()
}
