//! Keyed pool of expensive remote API clients.
//!
//! A [`ClientPool`] hands out one shared client per key (typically a model identifier),
//! building it on first use from a per-key [`ClientConfig`]. Concurrent requests for a key that
//! is still being built wait for that single build instead of starting their own. Entries are
//! dropped once older than the pool TTL and, when the pool is full, the least recently used
//! entry makes room for a new one.
//!
//! ```ignore
//! use clientpool::{ApiClientFactory, ClientConfig, ClientPool, PoolConfig};
//! use std::sync::Arc;
//!
//! let pool = Arc::new(ClientPool::with_config(ApiClientFactory::new(), PoolConfig::default()));
//! let cfg = ClientConfig::new("https://api.deepseek.com/v1", "sk-...");
//! let client = pool.acquire("deepseek-chat", cfg).await?;
//! println!("{}", pool.stats());
//! ```

pub mod client;
pub mod config;
pub mod errors;
pub mod factory;
pub mod pool;
pub mod resolver;
pub mod utils;

pub use client::{ApiClient, ApiClientFactory};
pub use config::{BuildPolicy, ClientConfig};
pub use errors::{BoxError, PoolError};
pub use factory::ClientFactory;
pub use pool::{ClientPool, EntrySnapshot, PoolConfig, StatsSnapshot};
pub use resolver::{ConfigCatalog, ConfigResolver, ConfigSource};

/// Initializes logging from the `CLIENTPOOL_LOG_*` environment variables.
///
/// This function should be called once, before the first pool is created.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    utils::logger::configure_from_env()
}
