use std::sync::Arc;

use hyper::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use themis_common::{
    EntityEnvelope, EntityRef, EntityResponse, Endpoint, Result, Topology,
    ENTITIES_PATH, HEALTH_PATH, TRANSACTION_HEADER,
};
use tracing::debug;

use crate::config::ClientConfig;
use crate::executor::RequestExecutor;
use crate::topology::{pick, TopologyResolver};
use crate::transport::{HttpRequest, HttpResponse, HyperTransport, Transport};

/// Topology-aware ThemisDB client.
///
/// Each entity is routed to the shard picked by hashing its URN over the
/// current shard list. The list comes from the cluster's metadata service,
/// loaded lazily on first use, or from the bootstrap endpoints when metadata
/// is unavailable.
///
/// The client is cheap to clone; clones share configuration, connection pool
/// and routing state.
///
/// # Example
///
/// ```rust,no_run
/// use serde_json::json;
/// use themis_client::{ClientConfig, ThemisClient};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ThemisClient::new(ClientConfig::new(["http://127.0.0.1:8765"]))?;
///
/// client.put("relational", "users", "1", &json!({"name": "Alice"})).await?;
/// let user = client.get("relational", "users", "1").await?;
/// assert_eq!(user, Some(json!({"name": "Alice"})));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ThemisClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    executor: RequestExecutor,
    resolver: TopologyResolver,
    custom_transport: bool,
}

impl ThemisClient {
    /// Creates a client over the built-in HTTP transport.
    ///
    /// Fails with [`ThemisError::Config`](themis_common::ThemisError::Config) when no endpoints are given or
    /// `retry.max_retries` is zero. No request is made until the first
    /// operation.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::build(config, Arc::new(HyperTransport::new()), false)
    }

    /// Creates a client over a caller-supplied transport.
    ///
    /// Batch operations run sequentially on such clients.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        Self::build(config, transport, true)
    }

    fn build(config: ClientConfig, transport: Arc<dyn Transport>, custom_transport: bool) -> Result<Self> {
        let bootstrap = config.validate()?;
        let metadata_url = config.metadata_url(&bootstrap);
        let executor = RequestExecutor::new(transport, config.retry.clone(), config.timeout())?;
        let resolver = TopologyResolver::new(bootstrap, metadata_url, executor.clone());

        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                executor,
                resolver,
                custom_transport,
            }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn namespace(&self) -> &str {
        &self.inner.config.namespace
    }

    /// Reference to an entity in the client's namespace.
    pub fn entity(&self, model: &str, collection: &str, id: &str) -> EntityRef {
        EntityRef::new(model, self.namespace(), collection, id)
    }

    pub(crate) fn resolver(&self) -> &TopologyResolver {
        &self.inner.resolver
    }

    pub(crate) fn has_custom_transport(&self) -> bool {
        self.inner.custom_transport
    }

    // ============================================================================
    // Topology
    // ============================================================================

    pub fn bootstrap_endpoints(&self) -> &[Endpoint] {
        self.inner.resolver.bootstrap_endpoints()
    }

    /// Shards requests are currently routed over.
    pub async fn shard_endpoints(&self) -> Arc<Vec<Endpoint>> {
        self.inner.resolver.shards().await
    }

    /// The cached cluster topology, if one has been loaded.
    pub async fn topology(&self) -> Option<Arc<Topology>> {
        self.inner.resolver.topology().await
    }

    /// Re-fetches the topology. Unlike routing, this surfaces any failure.
    pub async fn refresh_topology(&self) -> Result<Arc<Topology>> {
        self.inner.resolver.refresh_topology().await
    }

    /// Loads the topology if none is cached; never fails.
    pub async fn ensure_topology(&self) -> Arc<Vec<Endpoint>> {
        self.inner.resolver.ensure_topology().await
    }

    /// `GET {endpoint}/health`, defaulting to the first bootstrap endpoint.
    pub async fn health(&self, endpoint: Option<&str>) -> Result<Value> {
        let target = match endpoint {
            Some(endpoint) => Endpoint::new(endpoint),
            None => self.inner.resolver.primary()?.clone(),
        };
        let url = target.join(HEALTH_PATH);
        let response = self.execute(HttpRequest::get(&url)).await?;
        response.error_for_status(&url)?.json_body()
    }

    pub(crate) async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.inner.executor.execute(request).await
    }

    // ============================================================================
    // Single-entity operations
    // ============================================================================

    /// Reads an entity. `Ok(None)` when the shard answers 404.
    pub async fn get(&self, model: &str, collection: &str, id: &str) -> Result<Option<Value>> {
        self.get_entity(&self.entity(model, collection, id)).await
    }

    /// Reads an entity and deserializes it into `T`.
    pub async fn get_as<T: DeserializeOwned>(
        &self,
        model: &str,
        collection: &str,
        id: &str,
    ) -> Result<Option<T>> {
        match self.get(model, collection, id).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Writes an entity. Strings are stored as they are, any other value as JSON.
    pub async fn put<T: Serialize + ?Sized>(
        &self,
        model: &str,
        collection: &str,
        id: &str,
        value: &T,
    ) -> Result<bool> {
        self.put_entity(&self.entity(model, collection, id), value).await
    }

    /// Deletes an entity. `Ok(false)` when it did not exist.
    pub async fn delete(&self, model: &str, collection: &str, id: &str) -> Result<bool> {
        self.delete_entity(&self.entity(model, collection, id)).await
    }

    pub async fn get_entity(&self, entity: &EntityRef) -> Result<Option<Value>> {
        self.get_scoped(entity, None).await
    }

    pub async fn put_entity<T: Serialize + ?Sized>(&self, entity: &EntityRef, value: &T) -> Result<bool> {
        self.put_scoped(entity, value, None).await
    }

    pub async fn delete_entity(&self, entity: &EntityRef) -> Result<bool> {
        self.delete_scoped(entity, None).await
    }

    pub(crate) async fn get_scoped(&self, entity: &EntityRef, tx: Option<&str>) -> Result<Option<Value>> {
        let shards = self.ensure_topology().await;
        self.get_routed(&shards, entity, tx).await
    }

    pub(crate) async fn put_scoped<T: Serialize + ?Sized>(
        &self,
        entity: &EntityRef,
        value: &T,
        tx: Option<&str>,
    ) -> Result<bool> {
        let shards = self.ensure_topology().await;
        self.put_routed(&shards, entity, value, tx).await
    }

    pub(crate) async fn delete_scoped(&self, entity: &EntityRef, tx: Option<&str>) -> Result<bool> {
        let shards = self.ensure_topology().await;
        self.delete_routed(&shards, entity, tx).await
    }

    // Routed variants take an already resolved shard list so batch workers
    // share one topology snapshot.

    pub(crate) async fn get_routed(
        &self,
        shards: &[Endpoint],
        entity: &EntityRef,
        tx: Option<&str>,
    ) -> Result<Option<Value>> {
        let url = entity_url_on(&pick(shards, &entity.urn())?, entity);
        let response = self
            .execute(HttpRequest::get(&url).header_opt(TRANSACTION_HEADER, tx))
            .await?;
        decode_get(response, &url)
    }

    pub(crate) async fn put_routed<T: Serialize + ?Sized>(
        &self,
        shards: &[Endpoint],
        entity: &EntityRef,
        value: &T,
        tx: Option<&str>,
    ) -> Result<bool> {
        let url = entity_url_on(&pick(shards, &entity.urn())?, entity);
        let request = HttpRequest::put(&url)
            .header_opt(TRANSACTION_HEADER, tx)
            .json(&EntityEnvelope::encode(value)?)?;
        let response = self.execute(request).await?;
        decode_put(response, &url)
    }

    pub(crate) async fn delete_routed(
        &self,
        shards: &[Endpoint],
        entity: &EntityRef,
        tx: Option<&str>,
    ) -> Result<bool> {
        let url = entity_url_on(&pick(shards, &entity.urn())?, entity);
        let response = self
            .execute(HttpRequest::delete(&url).header_opt(TRANSACTION_HEADER, tx))
            .await?;
        decode_delete(response, &url)
    }
}

/// `{shard}/entities/{storage_key}`
pub(crate) fn entity_url_on(shard: &Endpoint, entity: &EntityRef) -> String {
    shard.join(&format!("{}/{}", ENTITIES_PATH, entity.storage_key()))
}

pub(crate) fn decode_get(response: HttpResponse, url: &str) -> Result<Option<Value>> {
    if response.status == StatusCode::NOT_FOUND {
        debug!("{} not found", url);
        return Ok(None);
    }
    let payload: Value = response.error_for_status(url)?.json_body()?;
    Ok(Some(EntityResponse::from_payload(payload).into_value()))
}

/// Only 200 and 201 count as stored.
pub(crate) fn decode_put(response: HttpResponse, url: &str) -> Result<bool> {
    match response.status {
        StatusCode::OK | StatusCode::CREATED => Ok(true),
        _ => Err(response.into_status_error(url)),
    }
}

/// 200 counts as deleted, 404 as absent.
pub(crate) fn decode_delete(response: HttpResponse, url: &str) -> Result<bool> {
    match response.status {
        StatusCode::OK => Ok(true),
        StatusCode::NOT_FOUND => Ok(false),
        _ => response.error_for_status(url).map(|_| false),
    }
}

impl std::fmt::Debug for ThemisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThemisClient")
            .field("endpoints", &self.inner.config.endpoints)
            .field("namespace", &self.inner.config.namespace)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use themis_common::ThemisError;

    #[tokio::test]
    async fn test_client_creation() {
        let client = ThemisClient::new(ClientConfig::new(["http://127.0.0.1:8765/"]));
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_client_requires_endpoints() {
        let result = ThemisClient::new(ClientConfig::new(Vec::<String>::new()));
        assert!(matches!(result, Err(ThemisError::Config(_))));
    }

    #[tokio::test]
    async fn test_client_rejects_zero_retries() {
        let result = ThemisClient::new(ClientConfig::new(["http://a"]).with_max_retries(0));
        assert!(matches!(result, Err(ThemisError::Config(_))));
    }

    #[tokio::test]
    async fn test_client_is_clonable() {
        let client = ThemisClient::new(ClientConfig::new(["http://a"])).unwrap();
        let clone = client.clone();
        assert!(Arc::ptr_eq(&client.inner, &clone.inner));
    }

    #[tokio::test]
    async fn test_entity_uses_client_namespace() {
        let client = ThemisClient::new(ClientConfig::new(["http://a"]).with_namespace("tenant")).unwrap();
        let entity = client.entity("relational", "users", "1");
        assert_eq!(entity.urn(), "urn:themis:relational:tenant:users:1");
        assert_eq!(
            entity_url_on(&Endpoint::new("http://shard"), &entity),
            "http://shard/entities/relational.tenant.users:1"
        );
    }

    #[test]
    fn test_decode_get() {
        let found = HttpResponse::new(StatusCode::OK, r#"{"blob":"{\"a\":1}"}"#);
        assert_eq!(decode_get(found, "u").unwrap(), Some(serde_json::json!({"a": 1})));

        let missing = HttpResponse::new(StatusCode::NOT_FOUND, "");
        assert_eq!(decode_get(missing, "u").unwrap(), None);

        let denied = HttpResponse::new(StatusCode::FORBIDDEN, "");
        assert_eq!(decode_get(denied, "u").unwrap_err().status(), Some(403));
    }

    #[test]
    fn test_decode_put_and_delete() {
        assert!(decode_put(HttpResponse::new(StatusCode::CREATED, ""), "u").unwrap());
        assert_eq!(
            decode_put(HttpResponse::new(StatusCode::ACCEPTED, ""), "u")
                .unwrap_err()
                .status(),
            Some(202)
        );
        assert!(decode_put(HttpResponse::new(StatusCode::BAD_REQUEST, ""), "u").is_err());

        assert!(decode_delete(HttpResponse::new(StatusCode::OK, ""), "u").unwrap());
        assert!(!decode_delete(HttpResponse::new(StatusCode::NOT_FOUND, ""), "u").unwrap());
        assert!(decode_delete(HttpResponse::new(StatusCode::CONFLICT, ""), "u").is_err());
    }
}
