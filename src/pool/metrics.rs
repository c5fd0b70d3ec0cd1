use std::sync::atomic::{AtomicU64, Ordering};

/// Pool counters. Relaxed atomics; they are only ever read as a snapshot.
#[derive(Default, Debug)]
pub struct PoolMetrics {
    pub total_requests: AtomicU64,
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub constructions: AtomicU64,
    pub construction_failures: AtomicU64,
    pub wait_timeouts: AtomicU64,
    pub ttl_evictions: AtomicU64,
    pub lru_evictions: AtomicU64,
    pub invalidations: AtomicU64,
    pub total_build_ns: AtomicU64,
}

impl PoolMetrics {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(u64::try_from(n).unwrap_or(u64::MAX), Ordering::Relaxed);
    }

    pub(crate) fn add_build_time(&self, elapsed: std::time::Duration) {
        let ns = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.total_build_ns.fetch_add(ns, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PoolMetricsSnapshot {
        PoolMetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            constructions: self.constructions.load(Ordering::Relaxed),
            construction_failures: self.construction_failures.load(Ordering::Relaxed),
            wait_timeouts: self.wait_timeouts.load(Ordering::Relaxed),
            ttl_evictions: self.ttl_evictions.load(Ordering::Relaxed),
            lru_evictions: self.lru_evictions.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            total_build_ns: self.total_build_ns.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct PoolMetricsSnapshot {
    pub total_requests: u64,
    pub hits: u64,
    pub misses: u64,
    pub constructions: u64,
    pub construction_failures: u64,
    pub wait_timeouts: u64,
    pub ttl_evictions: u64,
    pub lru_evictions: u64,
    pub invalidations: u64,
    pub total_build_ns: u64,
}

impl PoolMetricsSnapshot {
    /// All removals: age sweep, capacity sweep and explicit invalidation.
    pub fn evictions(&self) -> u64 {
        self.ttl_evictions + self.lru_evictions + self.invalidations
    }

    /// hits / total requests; 0.0 before the first request.
    pub fn hit_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.hits as f64 / self.total_requests as f64
        }
    }
}
