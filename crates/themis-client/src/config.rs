use std::time::Duration;

use themis_common::{normalize_endpoints, Endpoint, Result, ThemisError, DEFAULT_METADATA_PATH};

use crate::executor::RetryConfig;

/// Client configuration.
///
/// # Default Configuration
///
/// - `namespace`: `"default"`
/// - `timeout_ms`: 30000 (30 seconds)
/// - `retry`: [`RetryConfig::default`]
/// - `metadata_endpoint`: none, so the topology is read from
///   `{first bootstrap endpoint}{metadata_path}`
/// - `metadata_path`: `/_admin/cluster/topology`
/// - `max_workers`: none (batch operations use up to 4 workers)
///
/// # Example
///
/// ```rust
/// use themis_client::ClientConfig;
///
/// let config = ClientConfig::new(["http://127.0.0.1:8765"])
///     .with_namespace("tenant-a")
///     .with_timeout_ms(5_000)
///     .with_max_workers(8);
/// assert_eq!(config.namespace, "tenant-a");
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bootstrap endpoints. The first one also serves metadata and transactions.
    pub endpoints: Vec<String>,
    pub namespace: String,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    pub retry: RetryConfig,
    /// Absolute URL (`http...`) or path relative to the first bootstrap endpoint.
    pub metadata_endpoint: Option<String>,
    pub metadata_path: String,
    pub max_workers: Option<usize>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            namespace: "default".to_string(),
            timeout_ms: 30_000,
            retry: RetryConfig::default(),
            metadata_endpoint: None,
            metadata_path: DEFAULT_METADATA_PATH.to_string(),
            max_workers: None,
        }
    }
}

impl ClientConfig {
    pub fn new<I, S>(endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            endpoints: endpoints.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.retry.max_retries = max_retries;
        self
    }

    pub fn with_metadata_endpoint(mut self, metadata_endpoint: impl Into<String>) -> Self {
        self.metadata_endpoint = Some(metadata_endpoint.into());
        self
    }

    pub fn with_metadata_path(mut self, metadata_path: impl Into<String>) -> Self {
        self.metadata_path = metadata_path.into();
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = Some(max_workers);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Checks the configuration and returns the normalized bootstrap endpoints.
    ///
    /// The transport speaks plain HTTP only, so any endpoint that is not an
    /// `http://` URL is rejected with [`ThemisError::Config`].
    pub fn validate(&self) -> Result<Vec<Endpoint>> {
        self.retry.validate()?;
        let endpoints = normalize_endpoints(&self.endpoints)?;
        if let Some(endpoint) = endpoints.iter().find(|e| !e.as_str().starts_with("http://")) {
            return Err(ThemisError::Config(format!(
                "endpoint '{}' is not supported: only http:// URLs are accepted",
                endpoint
            )));
        }
        Ok(endpoints)
    }

    /// URL of the topology document for the given bootstrap list.
    pub fn metadata_url(&self, bootstrap: &[Endpoint]) -> String {
        let base = bootstrap.first().map(Endpoint::as_str).unwrap_or_default();
        match self.metadata_endpoint.as_deref() {
            Some(endpoint) if endpoint.starts_with("http") => endpoint.to_string(),
            Some(path) if !path.is_empty() => format!("{}{}", base, path),
            _ => format!("{}{}", base, self.metadata_path),
        }
    }
}
