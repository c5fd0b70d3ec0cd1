use crate::config::{BuildPolicy, ClientConfig};
use crate::errors::BoxError;
use async_trait::async_trait;

/// Builds the client objects a pool caches.
///
/// `build` receives a configuration that already passed [`ClientConfig::validate`].
#[async_trait]
pub trait ClientFactory: Send + Sync + 'static {
    type Client: Send + Sync + 'static;

    async fn build(
        &self,
        key: &str,
        config: &ClientConfig,
        policy: &BuildPolicy,
    ) -> Result<Self::Client, BoxError>;

    /// Cheap liveness check run on every cache hit. A client that fails it is dropped and rebuilt.
    ///
    /// Called without the pool lock held, so it may read the pool (`len`, `stats`).
    fn is_healthy(&self, _client: &Self::Client) -> bool {
        true
    }
}
