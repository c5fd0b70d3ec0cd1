#![allow(dead_code)]

use async_trait::async_trait;
use clientpool::{BoxError, BuildPolicy, ClientConfig, ClientFactory, ClientPool, PoolConfig};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug)]
pub struct TestClient {
    pub key: String,
    pub serial: usize,
    pub endpoint: String,
    pub policy: BuildPolicy,
}

/// Factory that counts builds per key and records how many ran at once for the same key.
#[derive(Default)]
pub struct CountingFactory {
    pub delay: Duration,
    pub failing: HashSet<String>,
    total: AtomicUsize,
    per_key: Mutex<HashMap<String, usize>>,
    active: Mutex<HashMap<String, usize>>,
    max_overlap: AtomicUsize,
}

impl CountingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self { delay, ..Self::default() }
    }

    pub fn failing(keys: &[&str]) -> Self {
        Self { failing: keys.iter().map(|k| k.to_string()).collect(), ..Self::default() }
    }

    pub fn total_builds(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn builds_for(&self, key: &str) -> usize {
        self.per_key.lock().get(key).copied().unwrap_or(0)
    }

    /// Highest number of simultaneous builds seen for any single key.
    pub fn max_overlap(&self) -> usize {
        self.max_overlap.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClientFactory for CountingFactory {
    type Client = TestClient;

    async fn build(
        &self,
        key: &str,
        config: &ClientConfig,
        policy: &BuildPolicy,
    ) -> Result<TestClient, BoxError> {
        let serial = self.total.fetch_add(1, Ordering::SeqCst) + 1;
        *self.per_key.lock().entry(key.to_string()).or_insert(0) += 1;
        let now_active = {
            let mut active = self.active.lock();
            let n = active.entry(key.to_string()).or_insert(0);
            *n += 1;
            *n
        };
        self.max_overlap.fetch_max(now_active, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(n) = self.active.lock().get_mut(key) {
            *n -= 1;
        }
        if self.failing.contains(key) {
            return Err(format!("backend refused {key}").into());
        }
        Ok(TestClient { key: key.to_string(), serial, endpoint: config.endpoint.clone(), policy: *policy })
    }
}

pub fn cfg_for(key: &str) -> ClientConfig {
    ClientConfig::new(format!("https://{key}.example.com/v1"), format!("sk-{key}-secret"))
}

pub fn pool(capacity: usize, ttl: Duration) -> ClientPool<CountingFactory> {
    ClientPool::with_config(CountingFactory::new(), PoolConfig::new(capacity, ttl))
}
