//! Where client configuration comes from.
//!
//! A caller hands the pool a [`ConfigSource`] per request: a resolver to call with the key,
//! a record to use as-is, or `Default` to fall back to the resolver injected into the pool.

use crate::config::ClientConfig;
use crate::errors::{BoxError, PoolError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Maps a pool key to the configuration used to build its client.
#[async_trait]
pub trait ConfigResolver: Send + Sync {
    async fn resolve(&self, key: &str) -> Result<ClientConfig, BoxError>;
}

#[async_trait]
impl<F> ConfigResolver for F
where
    F: Fn(&str) -> Result<ClientConfig, BoxError> + Send + Sync,
{
    async fn resolve(&self, key: &str) -> Result<ClientConfig, BoxError> {
        self(key)
    }
}

/// Per-request configuration input.
#[derive(Clone, Default)]
pub enum ConfigSource {
    Resolver(Arc<dyn ConfigResolver>),
    Record(ClientConfig),
    #[default]
    Default,
}

impl ConfigSource {
    pub fn resolver(resolver: impl ConfigResolver + 'static) -> Self {
        ConfigSource::Resolver(Arc::new(resolver))
    }

    pub(crate) async fn resolve(
        &self,
        key: &str,
        fallback: Option<&Arc<dyn ConfigResolver>>,
    ) -> Result<ClientConfig, PoolError> {
        let resolver = match self {
            ConfigSource::Record(cfg) => return Ok(cfg.clone()),
            ConfigSource::Resolver(r) => r,
            ConfigSource::Default => fallback.ok_or_else(|| PoolError::Resolver {
                key: key.to_string(),
                source: "no config resolver supplied and the pool has no default".into(),
            })?,
        };
        resolver
            .resolve(key)
            .await
            .map_err(|source| PoolError::Resolver { key: key.to_string(), source })
    }
}

impl From<ClientConfig> for ConfigSource {
    fn from(cfg: ClientConfig) -> Self {
        ConfigSource::Record(cfg)
    }
}

impl From<Arc<dyn ConfigResolver>> for ConfigSource {
    fn from(resolver: Arc<dyn ConfigResolver>) -> Self {
        ConfigSource::Resolver(resolver)
    }
}

/// Static table of per-key configurations, typically loaded from TOML:
///
/// ```toml
/// [models.deepseek-chat]
/// endpoint = "https://api.deepseek.com/v1"
/// credential = "sk-..."
/// display_name = "DeepSeek Chat"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigCatalog {
    #[serde(default)]
    pub models: HashMap<String, ClientConfig>,
}

impl ConfigCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_model(mut self, key: impl Into<String>, cfg: ClientConfig) -> Self {
        self.models.insert(key.into(), cfg);
        self
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

    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.models.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

#[async_trait]
impl ConfigResolver for ConfigCatalog {
    async fn resolve(&self, key: &str) -> Result<ClientConfig, BoxError> {
        self.models.get(key).cloned().ok_or_else(|| format!("no configuration for {key}").into())
    }
}
