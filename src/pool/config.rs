use crate::errors::PoolError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const DEFAULT_TTL_MS: u64 = 24 * 60 * 60 * 1000;
const DEFAULT_BUILD_TIMEOUT_MS: u64 = 60_000;

/// Configuration for a client pool.
///
/// Durations are kept in milliseconds. Files may still use the second-based `ttl_secs` and
/// `default_timeout_secs` keys; a `*_ms` key wins when both are present.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PoolConfigFile")]
pub struct PoolConfig {
    pub capacity: usize,
    pub ttl_ms: u64,
    /// How long a caller waits on someone else's in-flight construction.
    pub wait_timeout_ms: u64,
    /// Build timeout for records that do not set their own. Zero means the built-in default.
    pub default_timeout_ms: u64,
    pub default_max_retries: u32,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct PoolConfigFile {
    capacity: Option<usize>,
    ttl_ms: Option<u64>,
    ttl_secs: Option<u64>,
    wait_timeout_ms: Option<u64>,
    default_timeout_ms: Option<u64>,
    default_timeout_secs: Option<u64>,
    default_max_retries: Option<u32>,
}

impl From<PoolConfigFile> for PoolConfig {
    fn from(f: PoolConfigFile) -> Self {
        let d = PoolConfig::default();
        PoolConfig {
            capacity: f.capacity.unwrap_or(d.capacity),
            ttl_ms: f.ttl_ms.or(f.ttl_secs.map(secs_to_ms)).unwrap_or(d.ttl_ms),
            wait_timeout_ms: f.wait_timeout_ms.unwrap_or(d.wait_timeout_ms),
            default_timeout_ms: f
                .default_timeout_ms
                .or(f.default_timeout_secs.map(secs_to_ms))
                .unwrap_or(d.default_timeout_ms),
            default_max_retries: f.default_max_retries.unwrap_or(d.default_max_retries),
        }
        .normalized()
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: 20,
            ttl_ms: DEFAULT_TTL_MS,
            wait_timeout_ms: 10_000,
            default_timeout_ms: DEFAULT_BUILD_TIMEOUT_MS,
            default_max_retries: 3,
        }
    }
}

impl PoolConfig {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self::default().with_capacity(capacity).with_ttl(ttl)
    }

    /// Capacity below 1 is raised to 1.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self.normalized()
    }

    /// Millisecond precision; a zero TTL is raised to 1ms.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_ms = duration_to_ms(ttl);
        self.normalized()
    }

    #[must_use]
    pub fn with_wait_timeout(mut self, wait: Duration) -> Self {
        self.wait_timeout_ms = duration_to_ms(wait);
        self
    }

    /// Millisecond precision; zero restores the 60s default.
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout_ms = duration_to_ms(timeout);
        self.normalized()
    }

    #[must_use]
    pub fn with_default_max_retries(mut self, retries: u32) -> Self {
        self.default_max_retries = retries;
        self
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// # Errors
    /// Returns `PoolError::Toml` when the document does not parse.
    pub fn from_toml_str(s: &str) -> Result<Self, PoolError> {
        Ok(toml::from_str(s)?)
    }

    /// # Errors
    /// Returns `PoolError::Io` if the file cannot be read, `PoolError::Toml` if it does not parse.
    pub fn from_path(path: &Path) -> Result<Self, PoolError> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| PoolError::Io(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&s)
    }

    /// Applies overrides from the environment, when set and parseable:
    /// - CLIENTPOOL_CAPACITY
    /// - CLIENTPOOL_TTL_SECS, or CLIENTPOOL_TTL_MS (wins when both are set)
    /// - CLIENTPOOL_WAIT_TIMEOUT_MS
    #[must_use]
    pub fn apply_env(mut self) -> Self {
        if let Some(v) = env_parse::<usize>("CLIENTPOOL_CAPACITY") {
            self.capacity = v;
        }
        if let Some(v) = env_parse::<u64>("CLIENTPOOL_TTL_SECS") {
            self.ttl_ms = secs_to_ms(v);
        }
        if let Some(v) = env_parse::<u64>("CLIENTPOOL_TTL_MS") {
            self.ttl_ms = v;
        }
        if let Some(v) = env_parse::<u64>("CLIENTPOOL_WAIT_TIMEOUT_MS") {
            self.wait_timeout_ms = v;
        }
        self.normalized()
    }

    /// Brings hand-built values into range: capacity >= 1, ttl >= 1ms, and a zero build
    /// timeout replaced by the default.
    pub(crate) fn normalized(mut self) -> Self {
        self.capacity = self.capacity.max(1);
        self.ttl_ms = self.ttl_ms.max(1);
        if self.default_timeout_ms == 0 {
            self.default_timeout_ms = DEFAULT_BUILD_TIMEOUT_MS;
        }
        self
    }
}

fn secs_to_ms(secs: u64) -> u64 {
    secs.saturating_mul(1000)
}

fn duration_to_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse::<T>().ok())
}
