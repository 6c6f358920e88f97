//! HTTP transport seam.
//!
//! [`HyperTransport`] is the production implementation. Tests and embedders can
//! supply their own [`Transport`] through
//! [`ThemisClient::with_transport`](crate::ThemisClient::with_transport).

use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Method, Request, StatusCode};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use themis_common::{Result, ThemisError};

/// `User-Agent` sent with every request.
pub const USER_AGENT: &str = concat!("themis-rust-sdk/", env!("CARGO_PKG_VERSION"));

/// A fully described outgoing request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Adds `name: value` when `value` is present.
    pub fn header_opt(self, name: &str, value: Option<&str>) -> Self {
        match value {
            Some(value) => self.header(name, value),
            None => self,
        }
    }

    /// Serializes `body` as the JSON request body.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        self.body = Some(Bytes::from(serde_json::to_vec(body)?));
        Ok(self)
    }

    /// Value of the first header named `name`, compared case-insensitively.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A response with its body fully read.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn json_body<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn into_status_error(self, url: &str) -> ThemisError {
        ThemisError::HttpStatus {
            status: self.status.as_u16(),
            url: url.to_string(),
            body: self.text(),
        }
    }

    /// Passes 2xx responses through and turns anything else into
    /// [`ThemisError::HttpStatus`].
    pub fn error_for_status(self, url: &str) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(self.into_status_error(url))
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one request. Implementations must fail with
    /// [`ThemisError::Transport`] or [`ThemisError::Timeout`] when no response
    /// was received; any response, whatever its status, is `Ok`.
    async fn send(&self, request: HttpRequest, timeout: Duration) -> Result<HttpResponse>;
}

/// Plain-HTTP transport on the hyper connection-pooling client.
#[derive(Clone)]
pub struct HyperTransport {
    client: Client<HttpConnector, Full<Bytes>>,
}

impl HyperTransport {
    pub fn new() -> Self {
        Self {
            client: Client::builder(TokioExecutor::new()).build_http(),
        }
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn send(&self, request: HttpRequest, timeout: Duration) -> Result<HttpResponse> {
        let mut builder = Request::builder()
            .method(request.method.clone())
            .uri(&request.url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/json");
        if request.body.is_some() {
            builder = builder.header("Content-Type", "application/json");
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let http_request = builder
            .body(Full::new(request.body.clone().unwrap_or_default()))
            .map_err(|e| ThemisError::Transport(format!("Failed to build request: {}", e)))?;

        let exchange = async {
            let response = self
                .client
                .request(http_request)
                .await
                .map_err(|e| ThemisError::Transport(format!("HTTP request failed: {}", e)))?;
            let status = response.status();
            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|e| ThemisError::Transport(format!("Failed to read response: {}", e)))?
                .to_bytes();
            Ok::<_, ThemisError>(HttpResponse { status, body })
        };

        tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| ThemisError::Timeout(timeout.as_millis() as u64))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_agent() {
        assert!(USER_AGENT.starts_with("themis-rust-sdk/"));
    }

    #[test]
    fn test_request_builders() {
        let request = HttpRequest::put("http://shard/entities/k")
            .header("X-Transaction-Id", "tx-1")
            .json(&json!({"blob": "v"}))
            .unwrap();
        assert_eq!(request.method, Method::PUT);
        assert_eq!(request.header_value("x-transaction-id"), Some("tx-1"));
        assert_eq!(request.body.as_deref(), Some(&br#"{"blob":"v"}"#[..]));
    }

    #[test]
    fn test_header_opt() {
        let request = HttpRequest::get("http://shard").header_opt("X-Transaction-Id", None);
        assert!(request.headers.is_empty());
    }

    #[test]
    fn test_error_for_status() {
        let ok = HttpResponse::new(StatusCode::CREATED, "{}");
        assert!(ok.error_for_status("u").is_ok());

        let err = HttpResponse::new(StatusCode::BAD_REQUEST, "nope")
            .error_for_status("http://shard/x")
            .unwrap_err();
        match err {
            ThemisError::HttpStatus { status, url, body } => {
                assert_eq!(status, 400);
                assert_eq!(url, "http://shard/x");
                assert_eq!(body, "nope");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_hyper_transport_connection_refused() {
        // Port 1 is reserved and nothing listens on it in test environments.
        let transport = HyperTransport::new();
        let result = transport
            .send(HttpRequest::get("http://127.0.0.1:1/health"), Duration::from_secs(2))
            .await;
        assert!(result.unwrap_err().is_transport());
    }
}
