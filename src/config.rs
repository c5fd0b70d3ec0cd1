//! Per-key client configuration records.

use crate::errors::PoolError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Configuration used to build one client.
///
/// Field aliases accept the older `api_key` / `base_url` / `name` / `timeout` spellings.
#[derive(Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default, alias = "base_url")]
    pub endpoint: String,
    #[serde(default, alias = "api_key")]
    pub credential: String,
    /// Build/request timeout in seconds; fractions allowed. Zero falls back to the pool default.
    #[serde(default, alias = "timeout")]
    pub timeout_secs: Option<f64>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default, alias = "name")]
    pub display_name: Option<String>,
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>, credential: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into(), credential: credential.into(), ..Default::default() }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(timeout.as_secs_f64());
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Checks that `endpoint` and `credential` are present and not blank.
    ///
    /// # Errors
    /// Returns `PoolError::InvalidConfiguration` naming the first offending field.
    pub fn validate(&self, key: &str) -> Result<(), PoolError> {
        if self.endpoint.trim().is_empty() {
            return Err(PoolError::InvalidConfiguration { key: key.to_string(), field: "endpoint" });
        }
        if self.credential.trim().is_empty() {
            return Err(PoolError::InvalidConfiguration {
                key: key.to_string(),
                field: "credential",
            });
        }
        Ok(())
    }

    /// Name for logs and reports; falls back to the pool key.
    pub fn display_name_or<'a>(&'a self, key: &'a str) -> &'a str {
        self.display_name.as_deref().filter(|s| !s.is_empty()).unwrap_or(key)
    }

    /// Credential with everything past the first few characters hidden.
    #[must_use]
    pub fn masked_credential(&self) -> String {
        mask(&self.credential)
    }

    /// Timeout/retry policy for this record, falling back to the given defaults.
    /// A zero, negative or non-finite timeout counts as unset.
    #[must_use]
    pub fn build_policy(&self, default_timeout: Duration, default_max_retries: u32) -> BuildPolicy {
        let timeout = self
            .timeout_secs
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .filter(|d| !d.is_zero())
            .unwrap_or(default_timeout);
        BuildPolicy {
            timeout,
            max_retries: self.max_retries.unwrap_or(default_max_retries),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("endpoint", &self.endpoint)
            .field("credential", &self.masked_credential())
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("display_name", &self.display_name)
            .finish()
    }
}

const VISIBLE_PREFIX: usize = 6;

fn mask(secret: &str) -> String {
    if secret.is_empty() {
        return String::new();
    }
    let prefix: String = secret.chars().take(VISIBLE_PREFIX).collect();
    if prefix.len() == secret.len() { "***".to_string() } else { format!("{prefix}...") }
}

/// Timeout and retry budget handed to the client factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
}
