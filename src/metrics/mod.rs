//! Request metrics: hit/miss/error counters and latency accumulation.
//!
//! Process-wide state with an explicit lifecycle: created once at startup,
//! incremented from request paths, read via [`Metrics::snapshot`] and zeroed
//! via [`Metrics::reset`]. All counters are atomics so concurrent requests
//! never contend on a lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

use crate::cache::CacheTier;

/// Fire-and-forget metrics collaborator. The core only writes; readers go
/// through [`Metrics::snapshot`].
#[derive(Debug, Default)]
pub struct Metrics {
    hits_remote: AtomicU64,
    hits_local: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
    latency_ms_total: AtomicU64,
    latency_samples: AtomicU64,
}

/// Point-in-time view of the counters, served by `GET /metrics`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub hits_remote: u64,
    pub hits_local: u64,
    pub misses: u64,
    pub errors: u64,
    pub hit_ratio: f64,
    pub avg_latency_ms: f64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a cache hit on the given tier.
    pub fn record_hit(&self, tier: CacheTier) {
        match tier {
            CacheTier::Remote => self.hits_remote.fetch_add(1, Ordering::Relaxed),
            CacheTier::Local => self.hits_local.fetch_add(1, Ordering::Relaxed),
        };
    }

    /// Records a miss on both tiers.
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a request that failed with an upstream or internal error.
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Records end-to-end request latency.
    pub fn record_latency(&self, duration: Duration) {
        self.latency_ms_total
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
        self.latency_samples.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a consistent-enough snapshot for reporting. Counters are read
    /// individually; exact cross-counter consistency is not required.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let hits_remote = self.hits_remote.load(Ordering::Relaxed);
        let hits_local = self.hits_local.load(Ordering::Relaxed);
        let hits = hits_remote + hits_local;
        let misses = self.misses.load(Ordering::Relaxed);
        let errors = self.errors.load(Ordering::Relaxed);
        let latency_ms_total = self.latency_ms_total.load(Ordering::Relaxed);
        let latency_samples = self.latency_samples.load(Ordering::Relaxed);

        MetricsSnapshot {
            hits,
            hits_remote,
            hits_local,
            misses,
            errors,
            hit_ratio: hits as f64 / (hits + misses).max(1) as f64,
            avg_latency_ms: latency_ms_total as f64 / latency_samples.max(1) as f64,
        }
    }

    /// Zeroes every counter.
    pub fn reset(&self) {
        self.hits_remote.store(0, Ordering::Relaxed);
        self.hits_local.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
        self.latency_ms_total.store(0, Ordering::Relaxed);
        self.latency_samples.store(0, Ordering::Relaxed);
    }
}
