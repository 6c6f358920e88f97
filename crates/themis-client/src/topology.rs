//! Shard topology resolution.
//!
//! The resolver starts out routing over the bootstrap endpoints. The first
//! [`ensure_topology`](TopologyResolver::ensure_topology) call fetches the
//! cluster's shard map from the metadata service and, on success, replaces the
//! working shard list. A failed fetch is logged and routing stays on the
//! bootstrap list; the fetch is attempted again on the next call.

use std::sync::Arc;

use serde_json::Value;
use themis_common::{shard_index, Endpoint, Result, ThemisError, Topology};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::executor::RequestExecutor;
use crate::transport::HttpRequest;

#[derive(Debug, Clone)]
struct RoutingState {
    shards: Arc<Vec<Endpoint>>,
    topology: Option<Arc<Topology>>,
}

pub struct TopologyResolver {
    bootstrap: Arc<Vec<Endpoint>>,
    metadata_url: String,
    executor: RequestExecutor,
    state: RwLock<RoutingState>,
}

impl TopologyResolver {
    pub fn new(bootstrap: Vec<Endpoint>, metadata_url: String, executor: RequestExecutor) -> Self {
        let bootstrap = Arc::new(bootstrap);
        Self {
            state: RwLock::new(RoutingState {
                shards: bootstrap.clone(),
                topology: None,
            }),
            bootstrap,
            metadata_url,
            executor,
        }
    }

    pub fn bootstrap_endpoints(&self) -> &[Endpoint] {
        &self.bootstrap
    }

    /// First bootstrap endpoint, which serves metadata, health and transactions.
    pub fn primary(&self) -> Result<&Endpoint> {
        self.bootstrap
            .first()
            .ok_or_else(|| ThemisError::Config("endpoints must not be empty".to_string()))
    }

    pub fn metadata_url(&self) -> &str {
        &self.metadata_url
    }

    /// The current working shard list.
    pub async fn shards(&self) -> Arc<Vec<Endpoint>> {
        self.state.read().await.shards.clone()
    }

    /// The cached topology, if a refresh has succeeded.
    pub async fn topology(&self) -> Option<Arc<Topology>> {
        self.state.read().await.topology.clone()
    }

    /// Fetches the topology and atomically replaces the working shard list.
    pub async fn refresh_topology(&self) -> Result<Arc<Topology>> {
        let response = self
            .executor
            .execute(HttpRequest::get(&self.metadata_url))
            .await
            .and_then(|response| response.error_for_status(&self.metadata_url))
            .map_err(|e| ThemisError::topology_caused_by("failed to fetch shard topology", e))?;

        let payload: Value = response
            .json_body()
            .map_err(|e| ThemisError::topology_caused_by("invalid topology payload", e))?;

        let topology = Arc::new(Topology::from_payload(payload)?);
        info!(
            "Loaded shard topology (version {:?}) with {} shard(s)",
            topology.version,
            topology.shard_count()
        );

        let mut state = self.state.write().await;
        state.shards = Arc::new(topology.shards.clone());
        state.topology = Some(topology.clone());
        Ok(topology)
    }

    /// Makes sure a topology is cached, falling back to the bootstrap list
    /// when it cannot be loaded. Returns the shard list to route over.
    pub async fn ensure_topology(&self) -> Arc<Vec<Endpoint>> {
        {
            let state = self.state.read().await;
            if state.topology.is_some() {
                return state.shards.clone();
            }
        }

        match self.refresh_topology().await {
            Ok(topology) => Arc::new(topology.shards.clone()),
            Err(e) => {
                warn!(
                    "Topology refresh from {} failed, routing over bootstrap endpoints: {}",
                    self.metadata_url, e
                );
                let mut state = self.state.write().await;
                if state.topology.is_none() {
                    state.shards = self.bootstrap.clone();
                }
                state.shards.clone()
            }
        }
    }

    /// Ensures the topology and picks the shard for `key`.
    pub async fn resolve(&self, key: &str) -> Result<Endpoint> {
        let shards = self.ensure_topology().await;
        pick(&shards, key)
    }
}

/// Picks the shard for `key` from a resolved shard list.
pub(crate) fn pick(shards: &[Endpoint], key: &str) -> Result<Endpoint> {
    shard_index(key, shards.len())
        .map(|index| shards[index].clone())
        .ok_or_else(|| ThemisError::topology("no endpoints available for request"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_is_stable() {
        let shards = vec![Endpoint::new("http://a"), Endpoint::new("http://b")];
        let first = pick(&shards, "urn:themis:relational:default:users:1").unwrap();
        for _ in 0..10 {
            assert_eq!(pick(&shards, "urn:themis:relational:default:users:1").unwrap(), first);
        }
    }

    #[test]
    fn test_pick_without_shards() {
        let result = pick(&[], "key");
        assert!(matches!(result, Err(ThemisError::Topology { .. })));
    }
}
