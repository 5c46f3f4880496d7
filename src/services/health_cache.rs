//! Short-lived memo of provider health results.
//!
//! Readers get the last snapshot lock-free while it is younger than the TTL.
//! When it is stale, concurrent callers share one in-flight refresh instead
//! of each probing every provider. No lock is held across an await.

use crate::services::health_check_service::ProviderHealth;
use arc_swap::ArcSwapOption;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Source of the current time, swappable in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock used in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

pub type HealthSnapshot = Arc<Vec<ProviderHealth>>;

type SharedRefresh = Shared<BoxFuture<'static, HealthSnapshot>>;

struct CachedEntry {
    taken_at: Instant,
    value: HealthSnapshot,
}

pub struct HealthCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    snapshot: ArcSwapOption<CachedEntry>,
    in_flight: Mutex<Option<SharedRefresh>>,
}

impl HealthCache {
    /// A zero `ttl` disables reuse; concurrent refreshes are still merged.
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            snapshot: ArcSwapOption::empty(),
            in_flight: Mutex::new(None),
        }
    }

    pub fn with_system_clock(ttl: Duration) -> Self {
        Self::new(ttl, Arc::new(SystemClock))
    }

    /// Snapshot still within its TTL, if any.
    pub fn fresh(&self) -> Option<HealthSnapshot> {
        let entry = self.snapshot.load_full()?;
        let age = self.clock.now().saturating_duration_since(entry.taken_at);
        (age < self.ttl).then(|| entry.value.clone())
    }

    /// Return the fresh snapshot, or join (or start) the refresh.
    ///
    /// `refresh` is only invoked when no refresh is already running.
    pub async fn get_or_refresh<F, Fut>(&self, refresh: F) -> HealthSnapshot
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Vec<ProviderHealth>> + Send + 'static,
    {
        if let Some(value) = self.fresh() {
            return value;
        }

        let shared = {
            let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(running) => running.clone(),
                None => {
                    let started = refresh();
                    let running = async move { Arc::new(started.await) }.boxed().shared();
                    *slot = Some(running.clone());
                    running
                }
            }
        };

        let value = shared.clone().await;

        let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        // First waiter to finish publishes the result and frees the slot
        if slot.as_ref().is_some_and(|running| running.ptr_eq(&shared)) {
            *slot = None;
            self.snapshot.store(Some(Arc::new(CachedEntry {
                taken_at: self.clock.now(),
                value: value.clone(),
            })));
        }

        value
    }

    pub fn invalidate(&self) {
        self.snapshot.store(None);
    }
}
