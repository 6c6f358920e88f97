//! Query, vector search and graph traversal routing.

use serde_json::Value;
use themis_common::{
    contains_urn, traversal_nodes, Endpoint, QueryOptions, QueryRequest, QueryResult, Result,
    TraverseRequest, VectorSearchOptions, VectorSearchRequest, VectorSearchResult,
    GRAPH_TRAVERSE_PATH, QUERY_PATH, TRANSACTION_HEADER, VECTOR_SEARCH_PATH,
};
use tracing::{debug, warn};

use crate::client::ThemisClient;
use crate::topology::pick;
use crate::transport::HttpRequest;

impl ThemisClient {
    /// Runs an AQL query.
    ///
    /// A query that mentions a `urn:themis:` resource name goes to the single
    /// shard picked by hashing the query text. Any other query is sent to every
    /// shard in turn and the per-shard results are merged with
    /// [`QueryResult::merge`]. Merged results carry no `next_cursor`: cursors
    /// are shard-local, so paginating a broadcast query is not supported.
    pub async fn query(&self, aql: &str, options: &QueryOptions) -> Result<QueryResult> {
        self.query_scoped(aql, options, None).await
    }

    pub(crate) async fn query_scoped(
        &self,
        aql: &str,
        options: &QueryOptions,
        tx: Option<&str>,
    ) -> Result<QueryResult> {
        let shards = self.ensure_topology().await;
        let targets: Vec<Endpoint> = if contains_urn(aql) {
            vec![pick(&shards, aql)?]
        } else {
            shards.iter().cloned().collect()
        };
        debug!("Routing query to {} shard(s)", targets.len());

        let request = QueryRequest::new(aql, options);
        let mut partials = Vec::with_capacity(targets.len());
        for shard in &targets {
            let url = shard.join(QUERY_PATH);
            let http_request = HttpRequest::post(&url)
                .header_opt(TRANSACTION_HEADER, tx)
                .json(&request)?;
            let payload: Value = self
                .execute(http_request)
                .await?
                .error_for_status(&url)?
                .json_body()?;
            partials.push(QueryResult::from_payload(payload));
        }

        Ok(QueryResult::merge(partials))
    }

    /// Nearest-neighbour search across every shard.
    ///
    /// Shards that fail or answer with anything but 200 are skipped. When no
    /// shard answers the result is empty rather than an error. At most `k`
    /// hits are returned, even when only one shard answers.
    pub async fn vector_search(
        &self,
        vector: &[f32],
        k: usize,
        options: &VectorSearchOptions,
    ) -> Result<VectorSearchResult> {
        let shards = self.ensure_topology().await;
        let request = VectorSearchRequest::new(vector, k, options);

        let mut responses = Vec::with_capacity(shards.len());
        for shard in shards.iter() {
            let url = shard.join(VECTOR_SEARCH_PATH);
            let response = match self.execute(HttpRequest::post(&url).json(&request)?).await {
                Ok(response) => response,
                Err(e) => {
                    warn!("Vector search on {} failed, skipping shard: {}", shard, e);
                    continue;
                }
            };
            if response.status.as_u16() != 200 {
                warn!(
                    "Vector search on {} returned {}, skipping shard",
                    shard, response.status
                );
                continue;
            }
            match response.json_body::<Value>() {
                Ok(payload) => responses.push(payload),
                Err(e) => warn!("Vector search on {} returned an invalid body: {}", shard, e),
            }
        }

        Ok(VectorSearchResult::merge(responses, k))
    }

    /// Traverses the graph from `start` on the shard that owns it.
    pub async fn graph_traverse(
        &self,
        start: &str,
        max_depth: u32,
        edge_type: Option<&str>,
    ) -> Result<Vec<Value>> {
        let shard = self.resolver().resolve(start).await?;
        let url = shard.join(GRAPH_TRAVERSE_PATH);
        let request = TraverseRequest {
            start: start.to_string(),
            max_depth,
            edge_type: edge_type.map(str::to_string),
        };
        let payload: Value = self
            .execute(HttpRequest::post(&url).json(&request)?)
            .await?
            .error_for_status(&url)?
            .json_body()?;
        Ok(traversal_nodes(&payload))
    }
}
