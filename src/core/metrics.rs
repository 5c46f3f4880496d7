//! Prometheus metrics for monitoring the LuxRig bridge.
//!
//! This module provides a centralized metrics registry for tracking requests,
//! local provider health and routing decisions.

use prometheus::{
    register_gauge_vec, register_histogram_vec, register_int_counter_vec, GaugeVec, HistogramVec,
    IntCounterVec,
};
use std::sync::OnceLock;

/// Container for all application metrics.
pub struct Metrics {
    /// Total number of requests by method, endpoint and status
    pub request_count: IntCounterVec,

    /// Request duration histogram in seconds
    pub request_duration: HistogramVec,

    /// Number of currently active requests by endpoint
    pub active_requests: GaugeVec,

    /// Provider health status (1=connected, 0=error or disconnected)
    pub provider_health: GaugeVec,

    /// Health probe latency histogram in seconds
    pub provider_latency: HistogramVec,

    /// Chat routing decisions by complexity label and destination
    pub routing_decisions: IntCounterVec,

    /// Requests relayed by the generic proxy, by provider and upstream status
    pub proxied_requests: IntCounterVec,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Initialize the metrics registry.
///
/// This should be called once at application startup. Subsequent calls will
/// return the same instance.
///
/// # Examples
///
/// ```no_run
/// use luxrig_bridge::core::metrics::init_metrics;
///
/// let metrics = init_metrics();
/// metrics.request_count.with_label_values(&["GET", "/health", "200"]).inc();
/// ```
pub fn init_metrics() -> &'static Metrics {
    METRICS.get_or_init(|| {
        let request_count = register_int_counter_vec!(
            "luxrig_requests_total",
            "Total number of requests",
            &["method", "endpoint", "status_code"]
        )
        .expect("Failed to register request_count metric");

        let request_duration = register_histogram_vec!(
            "luxrig_request_duration_seconds",
            "Request duration in seconds",
            &["method", "endpoint"],
            vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]
        )
        .expect("Failed to register request_duration metric");

        let active_requests = register_gauge_vec!(
            "luxrig_active_requests",
            "Number of active requests",
            &["endpoint"]
        )
        .expect("Failed to register active_requests metric");

        let provider_health = register_gauge_vec!(
            "luxrig_provider_health",
            "Local provider health status (1=connected, 0=error or disconnected)",
            &["provider"]
        )
        .expect("Failed to register provider_health metric");

        let provider_latency = register_histogram_vec!(
            "luxrig_provider_probe_latency_seconds",
            "Local provider health probe latency in seconds",
            &["provider"],
            vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0]
        )
        .expect("Failed to register provider_latency metric");

        let routing_decisions = register_int_counter_vec!(
            "luxrig_routing_decisions_total",
            "Chat routing decisions by complexity and destination",
            &["complexity", "routed_to"]
        )
        .expect("Failed to register routing_decisions metric");

        let proxied_requests = register_int_counter_vec!(
            "luxrig_proxied_requests_total",
            "Requests relayed to local providers by the generic proxy",
            &["provider", "status_code"]
        )
        .expect("Failed to register proxied_requests metric");

        Metrics {
            request_count,
            request_duration,
            active_requests,
            provider_health,
            provider_latency,
            routing_decisions,
            proxied_requests,
        }
    })
}

/// Get the global metrics instance, initializing it on first use.
pub fn get_metrics() -> &'static Metrics {
    init_metrics()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialization() {
        let metrics = init_metrics();
        metrics
            .request_count
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let metrics2 = get_metrics();
        assert!(std::ptr::eq(metrics, metrics2));
    }

    #[test]
    fn test_routing_decision_metric() {
        let metrics = init_metrics();

        let initial = metrics
            .routing_decisions
            .with_label_values(&["medium", "local-unique"])
            .get();

        metrics
            .routing_decisions
            .with_label_values(&["medium", "local-unique"])
            .inc();

        let after = metrics
            .routing_decisions
            .with_label_values(&["medium", "local-unique"])
            .get();

        assert_eq!(after, initial + 1);
    }

    #[test]
    fn test_provider_health_metric() {
        let metrics = init_metrics();

        metrics
            .provider_health
            .with_label_values(&["metrics-test-provider"])
            .set(1.0);
        assert_eq!(
            metrics
                .provider_health
                .with_label_values(&["metrics-test-provider"])
                .get(),
            1.0
        );

        metrics
            .provider_health
            .with_label_values(&["metrics-test-provider"])
            .set(0.0);
        assert_eq!(
            metrics
                .provider_health
                .with_label_values(&["metrics-test-provider"])
                .get(),
            0.0
        );
    }

    #[test]
    fn test_active_requests_metric() {
        let metrics = init_metrics();
        let gauge = metrics.active_requests.with_label_values(&["/metrics-test"]);

        let initial = gauge.get();
        gauge.inc();
        assert_eq!(gauge.get(), initial + 1.0);
        gauge.dec();
        assert_eq!(gauge.get(), initial);
    }
}
