use crate::pool::metrics::PoolMetricsSnapshot;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Read-only view of one cached client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntrySnapshot {
    pub key: String,
    pub display_name: String,
    pub endpoint: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub age: Duration,
    /// Time since the client was last handed out.
    pub idle: Duration,
    pub access_count: u64,
    pub valid: bool,
}

/// Point-in-time pool statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub cache_size: usize,
    pub in_flight: usize,
    pub capacity: usize,
    pub ttl: Duration,
    pub total_requests: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_ratio: f64,
    pub constructions: u64,
    pub construction_failures: u64,
    pub wait_timeouts: u64,
    pub ttl_evictions: u64,
    pub lru_evictions: u64,
    pub invalidations: u64,
    pub evictions: u64,
    pub avg_build_ms: f64,
    /// Sorted by key.
    pub entries: Vec<EntrySnapshot>,
}

impl StatsSnapshot {
    pub(crate) fn assemble(
        metrics: PoolMetricsSnapshot,
        in_flight: usize,
        capacity: usize,
        ttl: Duration,
        mut entries: Vec<EntrySnapshot>,
    ) -> Self {
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        let avg_build_ms = if metrics.constructions == 0 {
            0.0
        } else {
            metrics.total_build_ns as f64 / metrics.constructions as f64 / 1_000_000.0
        };
        Self {
            cache_size: entries.len(),
            in_flight,
            capacity,
            ttl,
            total_requests: metrics.total_requests,
            hits: metrics.hits,
            misses: metrics.misses,
            hit_ratio: metrics.hit_ratio(),
            constructions: metrics.constructions,
            construction_failures: metrics.construction_failures,
            wait_timeouts: metrics.wait_timeouts,
            ttl_evictions: metrics.ttl_evictions,
            lru_evictions: metrics.lru_evictions,
            invalidations: metrics.invalidations,
            evictions: metrics.evictions(),
            avg_build_ms,
            entries,
        }
    }

    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.key.as_str()).collect()
    }

    pub fn entry(&self, key: &str) -> Option<&EntrySnapshot> {
        self.entries.iter().find(|e| e.key == key)
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "client pool statistics")?;
        writeln!(f, "{}", "=".repeat(50))?;
        writeln!(f, "cached:        {}/{} clients", self.cache_size, self.capacity)?;
        writeln!(f, "in flight:     {}", self.in_flight)?;
        writeln!(f, "requests:      {}", self.total_requests)?;
        writeln!(f, "hit rate:      {:.1}% ({} hits, {} misses)", self.hit_ratio * 100.0, self.hits, self.misses)?;
        writeln!(f, "constructions: {} ({} failed, avg {:.1}ms)", self.constructions, self.construction_failures, self.avg_build_ms)?;
        writeln!(
            f,
            "evictions:     {} (ttl {}, lru {}, invalidated {})",
            self.evictions, self.ttl_evictions, self.lru_evictions, self.invalidations
        )?;
        if self.entries.is_empty() {
            return writeln!(f, "\nno cached clients");
        }
        writeln!(f, "\ncached clients:")?;
        for e in &self.entries {
            writeln!(f, "  - {} ({}) -> {}", e.key, e.display_name, e.endpoint)?;
            writeln!(f, "      accesses: {}", e.access_count)?;
            writeln!(f, "      created:  {}", e.created_at.format("%H:%M:%S"))?;
            writeln!(f, "      last use: {}", e.last_accessed_at.format("%H:%M:%S"))?;
        }
        Ok(())
    }
}
