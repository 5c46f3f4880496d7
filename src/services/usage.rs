//! In-memory usage counters for routed chat requests.
//!
//! Counters are process-local and reset on restart.

use crate::services::classifier::ComplexityLabel;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Estimated cloud spend avoided per locally served request, in USD.
pub const ESTIMATED_SAVINGS_PER_REQUEST: f64 = 0.02;

#[derive(Debug)]
pub struct UsageTracker {
    started_at: Instant,
    total_requests: AtomicU64,
    local_requests: AtomicU64,
    cloud_recommendations: AtomicU64,
    local_failures: AtomicU64,
    simple: AtomicU64,
    medium: AtomicU64,
    complex: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexityCounts {
    pub simple: u64,
    pub medium: u64,
    pub complex: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub total_requests: u64,
    pub local_requests: u64,
    pub cloud_recommendations: u64,
    pub local_failures: u64,
    pub by_complexity: ComplexityCounts,
    pub estimated_savings_usd: f64,
    pub uptime_seconds: u64,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            total_requests: AtomicU64::new(0),
            local_requests: AtomicU64::new(0),
            cloud_recommendations: AtomicU64::new(0),
            local_failures: AtomicU64::new(0),
            simple: AtomicU64::new(0),
            medium: AtomicU64::new(0),
            complex: AtomicU64::new(0),
        }
    }

    /// Count a classified chat request.
    pub fn record_classification(&self, label: ComplexityLabel) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        let counter = match label {
            ComplexityLabel::Simple => &self.simple,
            ComplexityLabel::Medium => &self.medium,
            ComplexityLabel::Complex => &self.complex,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_local_success(&self) {
        self.local_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_local_failure(&self) {
        self.local_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cloud_recommendation(&self) {
        self.cloud_recommendations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        let local_requests = self.local_requests.load(Ordering::Relaxed);
        UsageSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            local_requests,
            cloud_recommendations: self.cloud_recommendations.load(Ordering::Relaxed),
            local_failures: self.local_failures.load(Ordering::Relaxed),
            by_complexity: ComplexityCounts {
                simple: self.simple.load(Ordering::Relaxed),
                medium: self.medium.load(Ordering::Relaxed),
                complex: self.complex.load(Ordering::Relaxed),
            },
            estimated_savings_usd: local_requests as f64 * ESTIMATED_SAVINGS_PER_REQUEST,
            uptime_seconds: self.started_at.elapsed().as_secs(),
        }
    }
}

impl Default for UsageTracker {
    fn default() -> Self {
        Self::new()
    }
}
