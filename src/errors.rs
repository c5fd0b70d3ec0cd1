use std::time::Duration;
use thiserror::Error;

/// Boxed cause returned by resolvers and client factories.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("client key must not be empty")]
    EmptyKey,

    #[error("config resolver failed for {key}: {source}")]
    Resolver {
        key: String,
        #[source]
        source: BoxError,
    },

    #[error("invalid configuration for {key}: `{field}` is missing or empty")]
    InvalidConfiguration { key: String, field: &'static str },

    #[error("client construction failed for {key}: {source}")]
    ConstructionFailed {
        key: String,
        #[source]
        source: BoxError,
    },

    #[error("gave up on in-flight construction of {key} after {waited:?}")]
    WaitTimeout { key: String, waited: Duration },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

impl PoolError {
    /// True when another caller was still building the client; asking again may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, PoolError::WaitTimeout { .. })
    }

    /// The key the failure relates to, if any.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            PoolError::Resolver { key, .. }
            | PoolError::InvalidConfiguration { key, .. }
            | PoolError::ConstructionFailed { key, .. }
            | PoolError::WaitTimeout { key, .. } => Some(key),
            PoolError::EmptyKey | PoolError::Io(_) | PoolError::Toml(_) => None,
        }
    }
}
