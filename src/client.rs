//! HTTP-backed client handle built by [`ApiClientFactory`].

use crate::config::{BuildPolicy, ClientConfig};
use crate::errors::BoxError;
use crate::factory::ClientFactory;
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Url};

/// A configured remote API client for one model key.
#[derive(Debug, Clone)]
pub struct ApiClient {
    key: String,
    display_name: String,
    endpoint: Url,
    credential: String,
    policy: BuildPolicy,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn policy(&self) -> BuildPolicy {
        self.policy
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Starts a request against `path` relative to the endpoint, with the credential attached.
    ///
    /// # Errors
    /// Fails if `path` cannot be joined onto the endpoint URL.
    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, BoxError> {
        let url = self.endpoint.join(path.trim_start_matches('/'))?;
        Ok(self.http.request(method, url).bearer_auth(&self.credential))
    }
}

/// Builds [`ApiClient`]s. Building does not touch the network.
#[derive(Debug, Clone, Default)]
pub struct ApiClientFactory {
    user_agent: Option<String>,
}

impl ApiClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }
}

#[async_trait]
impl ClientFactory for ApiClientFactory {
    type Client = ApiClient;

    async fn build(
        &self,
        key: &str,
        config: &ClientConfig,
        policy: &BuildPolicy,
    ) -> Result<ApiClient, BoxError> {
        // Join semantics need the trailing slash, otherwise the last path segment is replaced.
        let mut raw = config.endpoint.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let endpoint = Url::parse(&raw)?;
        let mut builder = reqwest::Client::builder().timeout(policy.timeout);
        if let Some(ua) = &self.user_agent {
            builder = builder.user_agent(ua.clone());
        }
        let http = builder.build()?;
        Ok(ApiClient {
            key: key.to_string(),
            display_name: config.display_name_or(key).to_string(),
            endpoint,
            credential: config.credential.trim().to_string(),
            policy: *policy,
            http,
        })
    }

    fn is_healthy(&self, client: &ApiClient) -> bool {
        !client.credential.is_empty() && client.endpoint.has_host()
    }
}
