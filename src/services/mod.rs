//! Business logic services for the LuxRig bridge.
//!
//! This module contains service layer components that implement
//! core business logic: provider lookup, health probing, prompt
//! classification and complexity-based routing.

pub mod classifier;
pub mod health_cache;
pub mod health_check_service;
pub mod registry;
pub mod retry;
pub mod router;
pub mod usage;

// Re-export commonly used types
pub use classifier::{classify, Classification, ComplexityLabel};
pub use health_cache::{Clock, HealthCache, HealthSnapshot, SystemClock};
pub use health_check_service::{HealthCheckService, LmStudioHealth, ProviderHealth, ProviderStatus};
pub use registry::{ProviderRegistry, ProviderSummary, ProxyTarget, UNKNOWN_PROVIDER};
pub use retry::RetryPolicy;
pub use router::{ChatMessage, ChatRequest, ComplexityRouter, RoutedTo};
pub use usage::{UsageSnapshot, UsageTracker};
