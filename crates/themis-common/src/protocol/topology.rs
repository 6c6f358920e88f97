//! Cluster topology payloads.
//!
//! The metadata service answers `GET /_admin/cluster/topology` with
//! `{"version": N, "shards": [...]}`. Shard entries come in several shapes:
//!
//! ```json
//! {"version": 3, "shards": [
//!     "http://shard-a:8080",
//!     {"id": "s2", "endpoint": "http://shard-b:8080"},
//!     {"id": "s3", "http_endpoint": "http://shard-c:8080"},
//!     {"id": "s4", "endpoints": ["http://shard-d:8080", "http://shard-d2:8080"]}
//! ]}
//! ```

use serde_json::Value;

use super::endpoint::Endpoint;
use super::error::{Result, ThemisError};

/// Default metadata path, relative to the first bootstrap endpoint.
pub const DEFAULT_METADATA_PATH: &str = "/_admin/cluster/topology";

pub const HEALTH_PATH: &str = "/health";

/// A resolved shard map. Replaced wholesale on refresh, never edited in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    pub version: Option<i64>,
    pub shards: Vec<Endpoint>,
    /// The payload the topology was parsed from.
    pub raw: Value,
}

impl Topology {
    /// Parses a metadata response.
    ///
    /// Fails when no shard endpoint can be extracted, even if the payload is
    /// otherwise well-formed JSON.
    pub fn from_payload(payload: Value) -> Result<Self> {
        let shards = extract_endpoints(&payload);
        if shards.is_empty() {
            return Err(ThemisError::topology(
                "no shard endpoints found in topology response",
            ));
        }
        Ok(Self {
            version: payload.get("version").and_then(Value::as_i64),
            shards,
            raw: payload,
        })
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }
}

/// Collects every shard endpoint in first-seen order, normalized and
/// de-duplicated.
pub fn extract_endpoints(payload: &Value) -> Vec<Endpoint> {
    let mut result: Vec<Endpoint> = Vec::new();
    let Some(shards) = payload.get("shards").and_then(Value::as_array) else {
        return result;
    };

    let mut push = |candidate: &str| {
        let endpoint = Endpoint::new(candidate);
        if !result.contains(&endpoint) {
            result.push(endpoint);
        }
    };

    for shard in shards {
        match shard {
            Value::String(endpoint) => push(endpoint),
            Value::Object(map) => {
                if let Some(endpoint) = map.get("endpoint").and_then(Value::as_str) {
                    push(endpoint);
                }
                if let Some(endpoint) = map.get("http_endpoint").and_then(Value::as_str) {
                    push(endpoint);
                }
                if let Some(endpoints) = map.get("endpoints").and_then(Value::as_array) {
                    for endpoint in endpoints.iter().filter_map(Value::as_str) {
                        push(endpoint);
                    }
                }
            }
            _ => {}
        }
    }

    result
}
