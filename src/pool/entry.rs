use crate::config::ClientConfig;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// One cached client and its bookkeeping.
#[derive(Debug)]
pub(crate) struct CacheEntry<C> {
    pub client: Arc<C>,
    pub config: ClientConfig,
    pub created_at: Instant,
    pub created_at_utc: DateTime<Utc>,
    pub last_accessed_at: Instant,
    pub last_accessed_at_utc: DateTime<Utc>,
    pub access_count: u64,
    pub valid: bool,
}

impl<C> CacheEntry<C> {
    /// A freshly built entry; its construction counts as the first access.
    pub fn new(client: Arc<C>, config: ClientConfig) -> Self {
        let now = Instant::now();
        let now_utc = Utc::now();
        Self {
            client,
            config,
            created_at: now,
            created_at_utc: now_utc,
            last_accessed_at: now,
            last_accessed_at_utc: now_utc,
            access_count: 1,
            valid: true,
        }
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    pub fn idle(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_accessed_at)
    }

    /// Strictly older than `ttl`; the sweep removes these.
    pub fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        self.age(now) > ttl
    }

    /// Young enough to hand out. An entry exactly `ttl` old is no longer fresh.
    pub fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        self.age(now) < ttl
    }

    /// Records one successful retrieval and returns the client.
    pub fn touch(&mut self) -> Arc<C> {
        self.last_accessed_at = Instant::now();
        self.last_accessed_at_utc = Utc::now();
        self.access_count += 1;
        Arc::clone(&self.client)
    }
}
