//! Retrying request execution.
//!
//! Every HTTP call the client makes goes through [`RequestExecutor::execute`],
//! which applies the retry policy and exponential backoff from [`RetryConfig`].

use std::sync::Arc;
use std::time::Duration;

use themis_common::{Result, ThemisError};
use tracing::{debug, warn};

use crate::transport::{HttpRequest, HttpResponse, Transport};

/// Retry behavior for shard requests.
///
/// `max_retries` is the total number of attempts, so `1` disables retrying.
///
/// # Default Configuration
///
/// - `max_retries`: 3
/// - `initial_backoff_ms`: 50
/// - `max_backoff_ms`: 1000
/// - `backoff_multiplier`: 2.0
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts per request, at least 1.
    pub max_retries: usize,
    /// Wait before the second attempt.
    pub initial_backoff_ms: u64,
    /// Backoff is capped at this value.
    pub max_backoff_ms: u64,
    /// Each wait is the previous one times this factor.
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 50,
            max_backoff_ms: 1000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Default backoff with `max_retries` attempts.
    pub fn new(max_retries: usize) -> Result<Self> {
        let config = Self {
            max_retries,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_retries < 1 {
            return Err(ThemisError::Config(
                "max_retries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Backoff following the one just waited.
    pub fn next_backoff(&self, backoff_ms: u64) -> u64 {
        std::cmp::min(
            (backoff_ms as f64 * self.backoff_multiplier) as u64,
            self.max_backoff_ms,
        )
    }
}

/// Sends requests through a [`Transport`] with retries.
#[derive(Clone)]
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    retry: RetryConfig,
    timeout: Duration,
}

impl RequestExecutor {
    pub fn new(transport: Arc<dyn Transport>, retry: RetryConfig, timeout: Duration) -> Result<Self> {
        retry.validate()?;
        Ok(Self {
            transport,
            retry,
            timeout,
        })
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Executes `request`, retrying transport failures and 5xx responses.
    ///
    /// - 2xx, 3xx and 4xx responses are returned as they are, without retrying.
    /// - A 5xx on the final attempt becomes [`ThemisError::HttpStatus`].
    /// - When every attempt fails in transport, the last transport error is returned.
    pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut backoff_ms = self.retry.initial_backoff_ms;
        let mut last_error: Option<ThemisError> = None;

        for attempt in 1..=self.retry.max_retries {
            debug!(
                "{} {} (attempt {}/{})",
                request.method, request.url, attempt, self.retry.max_retries
            );

            match self.transport.send(request.clone(), self.timeout).await {
                Ok(response) if response.status.as_u16() >= 500 => {
                    if attempt == self.retry.max_retries {
                        return Err(response.into_status_error(&request.url));
                    }
                    warn!(
                        "{} {} returned {} (attempt {}), retrying in {}ms",
                        request.method, request.url, response.status, attempt, backoff_ms
                    );
                }
                Ok(response) => return Ok(response),
                Err(e) if e.is_transport() => {
                    if attempt < self.retry.max_retries {
                        warn!(
                            "{} {} failed (attempt {}): {}, retrying in {}ms",
                            request.method, request.url, attempt, e, backoff_ms
                        );
                    }
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }

            if attempt < self.retry.max_retries {
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = self.retry.next_backoff(backoff_ms);
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ThemisError::Execution(format!(
                "request to {} failed without a specific error",
                request.url
            ))
        }))
    }
}
