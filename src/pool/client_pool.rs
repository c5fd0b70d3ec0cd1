use crate::config::ClientConfig;
use crate::errors::PoolError;
use crate::factory::ClientFactory;
use crate::pool::config::PoolConfig;
use crate::pool::entry::CacheEntry;
use crate::pool::metrics::{PoolMetrics, PoolMetricsSnapshot};
use crate::pool::policy::{enforce_capacity, purge_expired};
use crate::pool::stats::{EntrySnapshot, StatsSnapshot};
use crate::resolver::{ConfigResolver, ConfigSource};
use log::{debug, info, warn};
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;

/// Keyed cache of expensive clients with single-flight construction.
///
/// A cache hit takes the pool lock only long enough to check and bump the entry. A miss
/// either becomes the builder for its key or waits on the builder that is already running.
/// The lock is never held across an `.await`, so a slow build for one key does not block
/// callers asking for other keys.
pub struct ClientPool<F: ClientFactory> {
    factory: F,
    config: PoolConfig,
    default_resolver: Option<Arc<dyn ConfigResolver>>,
    state: Mutex<PoolState<F::Client>>,
    metrics: PoolMetrics,
}

struct PoolState<C> {
    entries: LruCache<String, CacheEntry<C>>,
    /// Completion signal per key under construction; flips to `true` when the builder exits.
    in_flight: HashMap<String, watch::Receiver<bool>>,
}

enum Role<'a, C> {
    Check(Arc<C>),
    Wait(watch::Receiver<bool>),
    Build(InFlightGuard<'a, C>),
}

/// Clears the in-flight marker and wakes waiters on every exit path of a build,
/// including when the building future is dropped mid-await.
struct InFlightGuard<'a, C> {
    state: &'a Mutex<PoolState<C>>,
    key: String,
    done: watch::Sender<bool>,
}

impl<C> Drop for InFlightGuard<'_, C> {
    fn drop(&mut self) {
        self.state.lock().in_flight.remove(&self.key);
        self.done.send_replace(true);
    }
}

impl<F: ClientFactory> ClientPool<F> {
    pub fn new(factory: F) -> Self {
        Self::with_config(factory, PoolConfig::default())
    }

    /// `config` is normalized first, so a hand-built literal with out-of-range values
    /// (capacity 0, zero TTL) behaves like the builder would.
    pub fn with_config(factory: F, config: PoolConfig) -> Self {
        let config = config.normalized();
        info!(
            "client pool initialised: capacity={}, ttl={:?}, wait_timeout={}ms",
            config.capacity,
            config.ttl(),
            config.wait_timeout_ms
        );
        Self {
            factory,
            config,
            default_resolver: None,
            state: Mutex::new(PoolState {
                entries: LruCache::unbounded(),
                in_flight: HashMap::new(),
            }),
            metrics: PoolMetrics::default(),
        }
    }

    /// Resolver used when a request passes [`ConfigSource::Default`].
    #[must_use]
    pub fn with_default_resolver(mut self, resolver: impl ConfigResolver + 'static) -> Self {
        self.default_resolver = Some(Arc::new(resolver));
        self
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Returns the client for `key`, building it on a miss.
    ///
    /// # Errors
    /// `EmptyKey`, `Resolver`, `InvalidConfiguration`, `ConstructionFailed`, or `WaitTimeout`
    /// when another caller's build for the same key did not produce a client in time.
    pub async fn acquire(
        &self,
        key: &str,
        source: impl Into<ConfigSource>,
    ) -> Result<Arc<F::Client>, PoolError> {
        if key.is_empty() {
            return Err(PoolError::EmptyKey);
        }
        let start = Instant::now();
        PoolMetrics::incr(&self.metrics.total_requests);

        let candidate = {
            let mut state = self.state.lock();
            purge_expired(&mut state.entries, &self.metrics, self.config.ttl());
            self.take_fresh(&mut state, key)
        };
        if let Some(client) = candidate.and_then(|c| self.confirm_healthy(key, c)) {
            PoolMetrics::incr(&self.metrics.hits);
            debug!("cache hit: {key} ({:.1}ms)", elapsed_ms(start));
            return Ok(client);
        }

        PoolMetrics::incr(&self.metrics.misses);
        self.construct_guarded(key, source.into(), start).await
    }

    /// Drops any cached client for `key` and builds a new one.
    ///
    /// If a build for `key` is already running, this waits for that build instead of starting
    /// a second one.
    ///
    /// # Errors
    /// Same as [`acquire`](Self::acquire).
    pub async fn refresh(
        &self,
        key: &str,
        source: impl Into<ConfigSource>,
    ) -> Result<Arc<F::Client>, PoolError> {
        if key.is_empty() {
            return Err(PoolError::EmptyKey);
        }
        let start = Instant::now();
        info!("refreshing client {key}");
        self.invalidate(key);
        PoolMetrics::incr(&self.metrics.total_requests);
        PoolMetrics::incr(&self.metrics.misses);
        {
            let mut state = self.state.lock();
            purge_expired(&mut state.entries, &self.metrics, self.config.ttl());
        }
        self.construct_guarded(key, source.into(), start).await
    }

    /// Removes the cached client for `key`. Returns whether one was present.
    pub fn invalidate(&self, key: &str) -> bool {
        let removed = self.state.lock().entries.pop(key).is_some();
        if removed {
            PoolMetrics::incr(&self.metrics.invalidations);
            crate::pool_event!("invalidate", "key" => key);
        }
        removed
    }

    /// Removes every cached client. Builds in progress still insert when they finish.
    pub fn invalidate_all(&self) -> usize {
        let cleared = {
            let mut state = self.state.lock();
            let n = state.entries.len();
            state.entries.clear();
            n
        };
        PoolMetrics::add(&self.metrics.invalidations, cleared);
        info!("cleared client cache ({cleared} clients)");
        crate::pool_event!("invalidate_all", "cleared" => cleared);
        cleared
    }

    /// Flags the cached client for `key` as broken so the next request rebuilds it.
    pub fn mark_unhealthy(&self, key: &str) -> bool {
        match self.state.lock().entries.peek_mut(key) {
            Some(entry) => {
                entry.valid = false;
                warn!("client {key} marked unhealthy");
                true
            }
            None => false,
        }
    }

    /// Runs the age sweep without serving a request. Returns number evicted.
    pub fn purge_expired_now(&self) -> usize {
        let mut state = self.state.lock();
        purge_expired(&mut state.entries, &self.metrics, self.config.ttl())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().entries.contains(key)
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn metrics_snapshot(&self) -> PoolMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Point-in-time statistics. Never mutates the pool.
    pub fn stats(&self) -> StatsSnapshot {
        let (entries, in_flight) = {
            let state = self.state.lock();
            let now = Instant::now();
            let entries: Vec<EntrySnapshot> = state
                .entries
                .iter()
                .map(|(key, e)| EntrySnapshot {
                    key: key.clone(),
                    display_name: e.config.display_name_or(key).to_string(),
                    endpoint: e.config.endpoint.clone(),
                    created_at: e.created_at_utc,
                    last_accessed_at: e.last_accessed_at_utc,
                    age: e.age(now),
                    idle: e.idle(now),
                    access_count: e.access_count,
                    valid: e.valid,
                })
                .collect();
            (entries, state.in_flight.len())
        };
        StatsSnapshot::assemble(
            self.metrics.snapshot(),
            in_flight,
            self.config.capacity,
            self.config.ttl(),
            entries,
        )
    }

    /// Writes a one-line JSON stats summary to the `clientpool::metrics` target.
    pub fn log_stats(&self) {
        let stats = self.stats();
        match serde_json::to_string(&stats) {
            Ok(line) => info!(target: "clientpool::metrics", "{line}"),
            Err(e) => warn!("failed to serialise pool stats: {e}"),
        }
    }

    /// Returns the client for `key` if it is fresh and not flagged invalid. A stale or flagged
    /// entry is removed instead. The factory health hook is not consulted here.
    fn take_fresh(&self, state: &mut PoolState<F::Client>, key: &str) -> Option<Arc<F::Client>> {
        let entry = state.entries.peek(key)?;
        let fresh = entry.is_fresh(self.config.ttl(), Instant::now());
        if fresh && entry.valid {
            return Some(Arc::clone(&entry.client));
        }
        state.entries.pop(key);
        if fresh {
            warn!("discarding unhealthy client {key}");
            PoolMetrics::incr(&self.metrics.invalidations);
        } else {
            info!("client {key} expired");
            PoolMetrics::incr(&self.metrics.ttl_evictions);
        }
        None
    }

    /// Runs the factory health hook with the pool lock released, then records the access or
    /// drops the entry. The entry is only touched if it still holds this same client.
    fn confirm_healthy(&self, key: &str, client: Arc<F::Client>) -> Option<Arc<F::Client>> {
        let healthy = self.factory.is_healthy(&client);
        let mut state = self.state.lock();
        let current = state.entries.peek(key).is_some_and(|e| Arc::ptr_eq(&e.client, &client));
        if healthy {
            if current {
                if let Some(entry) = state.entries.get_mut(key) {
                    entry.touch();
                }
            }
            return Some(client);
        }
        if current {
            state.entries.pop(key);
            warn!("discarding unhealthy client {key}");
            PoolMetrics::incr(&self.metrics.invalidations);
        }
        None
    }

    async fn construct_guarded(
        &self,
        key: &str,
        source: ConfigSource,
        start: Instant,
    ) -> Result<Arc<F::Client>, PoolError> {
        loop {
            let role = {
                let mut state = self.state.lock();
                // Another caller may have finished building while we were getting here.
                if let Some(client) = self.take_fresh(&mut state, key) {
                    Role::Check(client)
                } else {
                    match state.in_flight.get(key) {
                        Some(rx) => Role::Wait(rx.clone()),
                        None => {
                            let (tx, rx) = watch::channel(false);
                            state.in_flight.insert(key.to_string(), rx);
                            Role::Build(InFlightGuard {
                                state: &self.state,
                                key: key.to_string(),
                                done: tx,
                            })
                        }
                    }
                }
            };

            match role {
                // An unhealthy entry was dropped by `confirm_healthy`; go round again.
                Role::Check(client) => {
                    if let Some(client) = self.confirm_healthy(key, client) {
                        debug!("cache hit on recheck: {key} ({:.1}ms)", elapsed_ms(start));
                        return Ok(client);
                    }
                }
                Role::Wait(rx) => return self.wait_for_builder(key, rx, start).await,
                Role::Build(guard) => {
                    let result = self.build_and_insert(key, &source, start).await;
                    drop(guard);
                    return result;
                }
            }
        }
    }

    async fn wait_for_builder(
        &self,
        key: &str,
        mut rx: watch::Receiver<bool>,
        start: Instant,
    ) -> Result<Arc<F::Client>, PoolError> {
        let bound = self.config.wait_timeout();
        let wait_start = Instant::now();
        debug!("waiting for in-flight construction of {key}");
        crate::pool_event!("wait", "key" => key);

        // A closed channel also means the builder is gone; either way, look at the cache.
        let _ = tokio::time::timeout(bound, rx.wait_for(|done| *done)).await;

        let found = {
            let mut state = self.state.lock();
            self.take_fresh(&mut state, key)
        };
        if let Some(client) = found.and_then(|c| self.confirm_healthy(key, c)) {
            debug!("waited for {key}, got client ({:.1}ms)", elapsed_ms(start));
            return Ok(client);
        }
        let waited = wait_start.elapsed();
        PoolMetrics::incr(&self.metrics.wait_timeouts);
        warn!("no client for {key} after waiting {waited:?} on another build");
        Err(PoolError::WaitTimeout { key: key.to_string(), waited })
    }

    async fn build_and_insert(
        &self,
        key: &str,
        source: &ConfigSource,
        start: Instant,
    ) -> Result<Arc<F::Client>, PoolError> {
        debug!("building client for {key}");
        let (client, config) = match self.build(key, source).await {
            Ok(built) => built,
            Err(e) => {
                PoolMetrics::incr(&self.metrics.construction_failures);
                warn!("failed to build client for {key}: {e}");
                return Err(e);
            }
        };

        let client = Arc::new(client);
        let display = config.display_name_or(key).to_string();
        let endpoint = config.endpoint.clone();
        let credential = config.masked_credential();
        {
            let mut state = self.state.lock();
            if !state.entries.contains(key) {
                enforce_capacity(&mut state.entries, &self.metrics, self.config.capacity);
            }
            state.entries.put(key.to_string(), CacheEntry::new(Arc::clone(&client), config));
        }
        PoolMetrics::incr(&self.metrics.constructions);
        self.metrics.add_build_time(start.elapsed());

        let ms = elapsed_ms(start);
        info!("client ready: {display} ({ms:.1}ms) endpoint={endpoint} credential={credential}");
        crate::pool_event!("build", "key" => key, "ms" => ms);
        Ok(client)
    }

    async fn build(
        &self,
        key: &str,
        source: &ConfigSource,
    ) -> Result<(F::Client, ClientConfig), PoolError> {
        let config = source.resolve(key, self.default_resolver.as_ref()).await?;
        config.validate(key)?;
        let policy =
            config.build_policy(self.config.default_timeout(), self.config.default_max_retries);
        let outcome =
            tokio::time::timeout(policy.timeout, self.factory.build(key, &config, &policy)).await;
        match outcome {
            Ok(Ok(client)) => Ok((client, config)),
            Ok(Err(source)) => Err(PoolError::ConstructionFailed { key: key.to_string(), source }),
            Err(_) => Err(PoolError::ConstructionFailed {
                key: key.to_string(),
                source: format!("construction timed out after {:?}", policy.timeout).into(),
            }),
        }
    }
}

impl<F: ClientFactory> fmt::Display for ClientPool<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.metrics.snapshot();
        write!(
            f,
            "ClientPool(clients={}/{}, hit_rate={:.1}%)",
            self.len(),
            self.config.capacity,
            m.hit_ratio() * 100.0
        )
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
