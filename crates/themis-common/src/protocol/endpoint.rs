//! Shard endpoint normalization.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{Result, ThemisError};

/// A shard or bootstrap base URL without trailing slashes.
///
/// Paths are appended with [`Endpoint::join`], so `http://shard-a:8080/` and
/// `http://shard-a:8080` address the same shard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Endpoint(String);

impl Endpoint {
    pub fn new(url: impl AsRef<str>) -> Self {
        Endpoint(url.as_ref().trim_end_matches('/').to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Appends an absolute path (`/entities/...`) to the base URL.
    pub fn join(&self, path: &str) -> String {
        format!("{}{}", self.0, path)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Endpoint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Endpoint {
    fn from(url: &str) -> Self {
        Endpoint::new(url)
    }
}

impl From<String> for Endpoint {
    fn from(url: String) -> Self {
        Endpoint::new(url)
    }
}

/// Normalizes the configured bootstrap endpoints.
///
/// Fails with [`ThemisError::Config`] when the list is empty.
pub fn normalize_endpoints<I, S>(endpoints: I) -> Result<Vec<Endpoint>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let normalized: Vec<Endpoint> = endpoints.into_iter().map(Endpoint::new).collect();
    if normalized.is_empty() {
        return Err(ThemisError::Config("endpoints must not be empty".to_string()));
    }
    Ok(normalized)
}
