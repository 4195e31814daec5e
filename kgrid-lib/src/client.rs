//! HTTP client for the table service

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use crate::auth::TokenProvider;
use crate::error::ApiError;
use crate::rate_limit::ConcurrencyLimiter;
use crate::rate_limit::RetryConfig;

/// Client for the table service's scroll, upsert, delete and metadata
/// endpoints.
///
/// This client is cheap to clone (uses `Arc` internally) and can be shared
/// across threads safely. It implements
/// [`RemoteStore`](crate::remote::RemoteStore), so a
/// [`KnowledgeGrid`](crate::KnowledgeGrid) can be mounted on it directly.
///
/// # Example
///
/// ```ignore
/// use kgrid_lib::{GridClient, auth::StaticTokenProvider};
///
/// let client = GridClient::builder()
///     .url("https://tables.example.com/api")
///     .token_provider(StaticTokenProvider::new("my-token"))
///     .build()?;
/// ```
#[derive(Clone)]
pub struct GridClient {
    pub(crate) inner: Arc<GridClientInner>,
}

pub(crate) struct GridClientInner {
    pub(crate) base_url: String,
    pub(crate) token_provider: Arc<dyn TokenProvider>,
    pub(crate) http_client: Client,
    pub(crate) timeout: Option<Duration>,
    pub(crate) retry_config: RetryConfig,
    pub(crate) concurrency_limiter: ConcurrencyLimiter,
}

impl GridClient {
    /// Creates a new builder for constructing a client.
    pub fn builder() -> GridClientBuilder<Missing, Missing> {
        GridClientBuilder::new()
    }

    /// Returns the base URL of the table service.
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Returns the retry policy.
    pub fn retry_config(&self) -> &RetryConfig {
        &self.inner.retry_config
    }
}

impl std::fmt::Debug for GridClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridClient")
            .field("base_url", &self.inner.base_url)
            .field("timeout", &self.inner.timeout)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Typestate Builder
// =============================================================================

/// Marker type for missing required builder fields.
pub struct Missing;

/// Marker type for set builder fields.
pub struct Set<T>(T);

/// Builder for constructing a [`GridClient`].
///
/// Uses the typestate pattern to ensure required fields are set at compile time.
///
/// # Required Fields
///
/// - `url` - The table service base URL
/// - `token_provider` - A [`TokenProvider`] implementation
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use kgrid_lib::GridClient;
/// use kgrid_lib::auth::StaticTokenProvider;
/// use kgrid_lib::rate_limit::RetryConfig;
///
/// let client = GridClient::builder()
///     .url("https://tables.example.com/api")
///     .token_provider(StaticTokenProvider::new("token"))
///     .timeout(Duration::from_secs(10))
///     .retry_config(RetryConfig::no_retry())
///     .build()
///     .unwrap();
/// assert_eq!(client.base_url(), "https://tables.example.com/api");
/// ```
pub struct GridClientBuilder<Url, Provider> {
    url: Url,
    token_provider: Provider,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    retry_config: RetryConfig,
    max_concurrent: usize,
    http_client: Option<Client>,
}

impl GridClientBuilder<Missing, Missing> {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            url: Missing,
            token_provider: Missing,
            timeout: None,
            connect_timeout: None,
            retry_config: RetryConfig::default(),
            max_concurrent: ConcurrencyLimiter::default().limit(),
            http_client: None,
        }
    }
}

impl Default for GridClientBuilder<Missing, Missing> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> GridClientBuilder<Missing, P> {
    /// Sets the table service base URL.
    pub fn url(self, url: impl Into<String>) -> GridClientBuilder<Set<String>, P> {
        GridClientBuilder {
            url: Set(url.into()),
            token_provider: self.token_provider,
            timeout: self.timeout,
            connect_timeout: self.connect_timeout,
            retry_config: self.retry_config,
            max_concurrent: self.max_concurrent,
            http_client: self.http_client,
        }
    }
}

impl<U> GridClientBuilder<U, Missing> {
    /// Sets the token provider for authentication.
    pub fn token_provider<T: TokenProvider + 'static>(
        self,
        provider: T,
    ) -> GridClientBuilder<U, Set<Arc<dyn TokenProvider>>> {
        GridClientBuilder {
            url: self.url,
            token_provider: Set(Arc::new(provider) as Arc<dyn TokenProvider>),
            timeout: self.timeout,
            connect_timeout: self.connect_timeout,
            retry_config: self.retry_config,
            max_concurrent: self.max_concurrent,
            http_client: self.http_client,
        }
    }
}

impl<U, P> GridClientBuilder<U, P> {
    /// Sets the per-attempt request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the connection timeout.
    ///
    /// This is applied when building the HTTP client.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the retry policy.
    pub fn retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    /// Sets how many requests may be in flight at once.
    pub fn max_concurrent(mut self, limit: usize) -> Self {
        self.max_concurrent = limit;
        self
    }

    /// Sets a custom HTTP client.
    ///
    /// If not set, a default client will be created.
    pub fn http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }
}

impl GridClientBuilder<Set<String>, Set<Arc<dyn TokenProvider>>> {
    /// Builds the [`GridClient`].
    ///
    /// Fails if the URL is not an absolute `http`/`https` URL or the HTTP
    /// client cannot be created.
    pub fn build(self) -> Result<GridClient, ApiError> {
        let parsed = url::Url::parse(&self.url.0)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {e}", self.url.0)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::InvalidUrl(format!(
                "{}: unsupported scheme '{}'",
                self.url.0,
                parsed.scheme()
            )));
        }

        let http_client = match self.http_client {
            Some(client) => client,
            None => {
                let mut builder = Client::builder();
                if let Some(timeout) = self.connect_timeout {
                    builder = builder.connect_timeout(timeout);
                }
                builder.build()?
            }
        };

        Ok(GridClient {
            inner: Arc::new(GridClientInner {
                base_url: self.url.0.trim_end_matches('/').to_string(),
                token_provider: self.token_provider.0,
                http_client,
                timeout: self.timeout,
                retry_config: self.retry_config,
                concurrency_limiter: ConcurrencyLimiter::new(self.max_concurrent),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticTokenProvider;

    #[test]
    fn test_build_rejects_relative_url() {
        let result = GridClient::builder()
            .url("tables/api")
            .token_provider(StaticTokenProvider::new("t"))
            .build();

        assert!(matches!(result, Err(ApiError::InvalidUrl(_))));
    }

    #[test]
    fn test_build_rejects_non_http_scheme() {
        let result = GridClient::builder()
            .url("ftp://tables.example.com")
            .token_provider(StaticTokenProvider::new("t"))
            .build();

        assert!(matches!(result, Err(ApiError::InvalidUrl(_))));
    }

    #[test]
    fn test_build_trims_trailing_slash() {
        let client = GridClient::builder()
            .url("https://tables.example.com/api/")
            .token_provider(StaticTokenProvider::new("t"))
            .max_concurrent(2)
            .build()
            .unwrap();

        assert_eq!(client.base_url(), "https://tables.example.com/api");
        assert_eq!(client.inner.concurrency_limiter.limit(), 2);
    }
}
