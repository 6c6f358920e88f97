//! Connection settings and argument parsing helpers for the `themis` binary.
//!
//! Command-line flags win over the environment. When no `--endpoint` is
//! given, the comma-separated list in `THEMIS_ENDPOINTS` is used instead.

use anyhow::{anyhow, bail, Result};
use serde_json::Value;
use themis_client::ClientConfig;

/// Environment variable holding comma-separated bootstrap endpoints.
pub const ENDPOINTS_ENV: &str = "THEMIS_ENDPOINTS";

/// Connection flags shared by every subcommand.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionSettings {
    pub endpoints: Vec<String>,
    pub namespace: Option<String>,
    pub metadata_endpoint: Option<String>,
    pub max_retries: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub max_workers: Option<usize>,
}

impl ConnectionSettings {
    /// Builds a client configuration, falling back to `env_endpoints` when no
    /// endpoint flag was given.
    pub fn into_config(self, env_endpoints: Option<String>) -> Result<ClientConfig> {
        let endpoints = if self.endpoints.is_empty() {
            env_endpoints
                .as_deref()
                .map(split_endpoints)
                .unwrap_or_default()
        } else {
            self.endpoints
        };

        if endpoints.is_empty() {
            bail!(
                "No endpoints configured. Use --endpoint <url> or set {}",
                ENDPOINTS_ENV
            );
        }
        for endpoint in &endpoints {
            validate_http_url(endpoint, "endpoint")?;
        }

        let mut config = ClientConfig::new(endpoints);
        if let Some(namespace) = self.namespace {
            config = config.with_namespace(namespace);
        }
        if let Some(metadata_endpoint) = self.metadata_endpoint {
            config = config.with_metadata_endpoint(metadata_endpoint);
        }
        if let Some(max_retries) = self.max_retries {
            config = config.with_max_retries(max_retries);
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config = config.with_timeout_ms(timeout_ms);
        }
        if let Some(max_workers) = self.max_workers {
            config = config.with_max_workers(max_workers);
        }
        Ok(config)
    }
}

/// Splits a comma-separated endpoint list, dropping blanks.
pub fn split_endpoints(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Validates that a URL string starts with http://
pub fn validate_http_url(url: &str, description: &str) -> Result<()> {
    if url.starts_with("http://") {
        Ok(())
    } else if url.starts_with("https://") {
        Err(anyhow!(
            "Invalid {}: '{}' uses https, which is not supported; use http://",
            description,
            url
        ))
    } else {
        Err(anyhow!("Invalid {}: '{}' must start with http://", description, url))
    }
}

/// Parses a JSON argument, naming the argument in the error.
pub fn parse_json(raw: &str, what: &str) -> Result<Value> {
    serde_json::from_str(raw).map_err(|e| anyhow!("Invalid JSON in {}: {}", what, e))
}

/// Parses an entity value. With `raw` set the text is stored as-is.
pub fn parse_value(raw: &str, as_string: bool) -> Result<Value> {
    if as_string {
        Ok(Value::String(raw.to_string()))
    } else {
        parse_json(raw, "value")
    }
}

/// Parses a query vector given either as a JSON array or as comma-separated numbers.
pub fn parse_vector(raw: &str) -> Result<Vec<f32>> {
    let trimmed = raw.trim();
    let vector: Vec<f32> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed).map_err(|e| anyhow!("Invalid vector: {}", e))?
    } else {
        trimmed
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<f32>()
                    .map_err(|e| anyhow!("Invalid vector component '{}': {}", part.trim(), e))
            })
            .collect::<Result<_>>()?
    };

    if vector.is_empty() {
        bail!("Vector must not be empty");
    }
    Ok(vector)
}

/// Parses `name=json` query parameters. Values that are not valid JSON are
/// passed as strings.
pub fn parse_param(raw: &str) -> Result<(String, Value)> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("Invalid parameter '{}': expected name=value", raw))?;
    if name.is_empty() {
        bail!("Invalid parameter '{}': empty name", raw);
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((name.to_string(), value))
}
