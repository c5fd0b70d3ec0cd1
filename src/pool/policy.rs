use crate::pool::entry::CacheEntry;
use crate::pool::metrics::PoolMetrics;
use lru::LruCache;
use std::time::Duration;
use tokio::time::Instant;

/// Removes entries older than `ttl`. Returns number evicted.
pub(crate) fn purge_expired<C>(
    entries: &mut LruCache<String, CacheEntry<C>>,
    metrics: &PoolMetrics,
    ttl: Duration,
) -> usize {
    let now = Instant::now();
    let expired: Vec<String> = entries
        .iter()
        .filter(|(_, e)| e.is_expired(ttl, now))
        .map(|(k, _)| k.clone())
        .collect();

    for key in &expired {
        entries.pop(key);
        log::info!("evicted expired client {key}");
    }
    let count = expired.len();
    if count > 0 {
        PoolMetrics::add(&metrics.ttl_evictions, count);
        crate::pool_event!("ttl_purge", "evicted" => count, "keys" => expired);
    }
    count
}

/// Makes room for one insertion by evicting least recently accessed entries.
/// Returns the evicted keys, oldest first.
pub(crate) fn enforce_capacity<C>(
    entries: &mut LruCache<String, CacheEntry<C>>,
    metrics: &PoolMetrics,
    capacity: usize,
) -> Vec<String> {
    let mut evicted = Vec::new();
    while entries.len() >= capacity {
        let Some((key, entry)) = entries.pop_lru() else { break };
        log::info!(
            "cache full ({}/{capacity}); evicted least recently used client {key} (accessed {} times)",
            entries.len() + 1,
            entry.access_count
        );
        PoolMetrics::incr(&metrics.lru_evictions);
        crate::pool_event!("lru_evict", "key" => key.as_str(), "access_count" => entry.access_count);
        evicted.push(key);
    }
    evicted
}
