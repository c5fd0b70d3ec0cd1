mod config;
mod client_pool;
mod entry;
mod metrics;
mod policy;
mod stats;

pub use config::PoolConfig;
pub use client_pool::ClientPool;
pub use metrics::{PoolMetrics, PoolMetricsSnapshot};
pub use stats::{EntrySnapshot, StatsSnapshot};
