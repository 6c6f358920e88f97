//! Server-assisted transactions.
//!
//! A [`Transaction`] is opened on the first bootstrap endpoint and moves from
//! `Active` to either `Committed` or `RolledBack`. Entity and query operations
//! issued through it use the client's normal routing and carry the
//! `X-Transaction-Id` header.

use std::future::Future;
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use themis_common::{
    BeginTransactionRequest, BeginTransactionResponse, QueryOptions, QueryResult, Result,
    ThemisError, TransactionFinishRequest, TransactionOptions, TransactionState,
    TRANSACTION_BEGIN_PATH, TRANSACTION_COMMIT_PATH, TRANSACTION_HEADER,
    TRANSACTION_ROLLBACK_PATH,
};
use tracing::{debug, info, warn};

use crate::client::ThemisClient;
use crate::transport::{HttpRequest, HttpResponse};

/// Handle to an open transaction. Clones share the same state.
#[derive(Clone)]
pub struct Transaction {
    inner: Arc<TransactionInner>,
}

struct TransactionInner {
    id: String,
    client: ThemisClient,
    state: Mutex<TransactionState>,
}

impl Transaction {
    /// Wraps a transaction id the server has already issued.
    pub fn new(client: ThemisClient, id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(TransactionInner {
                id: id.into(),
                client,
                state: Mutex::new(TransactionState::Active),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn state(&self) -> TransactionState {
        *self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_active(&self) -> bool {
        self.state() == TransactionState::Active
    }

    fn set_state(&self, state: TransactionState) {
        *self.inner.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Moves `Active` to `Finishing` under a single lock, so only one commit
    /// or rollback can be in flight.
    fn claim_finish(&self) -> Result<FinishGuard<'_>> {
        let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        match *state {
            TransactionState::Active => {
                *state = TransactionState::Finishing;
                Ok(FinishGuard {
                    transaction: self,
                    outcome: None,
                })
            }
            current => Err(ThemisError::TransactionState {
                id: self.inner.id.clone(),
                state: current,
            }),
        }
    }

    /// Fails with [`ThemisError::TransactionState`] once the transaction has
    /// been committed or rolled back.
    pub fn ensure_active(&self) -> Result<()> {
        match self.state() {
            TransactionState::Active => Ok(()),
            state => Err(ThemisError::TransactionState {
                id: self.inner.id.clone(),
                state,
            }),
        }
    }

    pub async fn get(&self, model: &str, collection: &str, id: &str) -> Result<Option<Value>> {
        self.ensure_active()?;
        let entity = self.inner.client.entity(model, collection, id);
        self.inner.client.get_scoped(&entity, Some(self.id())).await
    }

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

    pub async fn put<T: Serialize + ?Sized>(
        &self,
        model: &str,
        collection: &str,
        id: &str,
        value: &T,
    ) -> Result<bool> {
        self.ensure_active()?;
        let entity = self.inner.client.entity(model, collection, id);
        self.inner
            .client
            .put_scoped(&entity, value, Some(self.id()))
            .await
    }

    pub async fn delete(&self, model: &str, collection: &str, id: &str) -> Result<bool> {
        self.ensure_active()?;
        let entity = self.inner.client.entity(model, collection, id);
        self.inner.client.delete_scoped(&entity, Some(self.id())).await
    }

    pub async fn query(&self, aql: &str, options: &QueryOptions) -> Result<QueryResult> {
        self.ensure_active()?;
        self.inner
            .client
            .query_scoped(aql, options, Some(self.id()))
            .await
    }

    /// Commits the transaction. While the request is in flight the state is
    /// `Finishing`; a failed commit leaves the transaction `Active`.
    pub async fn commit(&self) -> Result<()> {
        let mut guard = self.claim_finish()?;
        self.finish(TRANSACTION_COMMIT_PATH, "commit").await?;
        guard.complete(TransactionState::Committed);
        info!("Committed transaction {}", self.id());
        Ok(())
    }

    /// Rolls the transaction back. A failed rollback leaves it `Active`.
    pub async fn rollback(&self) -> Result<()> {
        let mut guard = self.claim_finish()?;
        self.finish(TRANSACTION_ROLLBACK_PATH, "rollback").await?;
        guard.complete(TransactionState::RolledBack);
        info!("Rolled back transaction {}", self.id());
        Ok(())
    }

    async fn finish(&self, path: &str, action: &str) -> Result<()> {
        let url = self.inner.client.resolver().primary()?.join(path);
        let request = HttpRequest::post(&url)
            .header(TRANSACTION_HEADER, self.id())
            .json(&TransactionFinishRequest {
                transaction_id: self.id(),
            })?;
        let response = self.inner.client.execute(request).await;
        refused_as_transaction_error(response, &url, action)?;
        Ok(())
    }

    /// Runs `f` inside the transaction.
    ///
    /// If `f` succeeds the transaction is committed, unless `f` already
    /// finished it. If `f` fails the transaction is rolled back and `f`'s
    /// error is returned; a failed rollback is only logged.
    pub async fn scope<F, Fut, T, E>(self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(Transaction) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<ThemisError>,
    {
        match f(self.clone()).await {
            Ok(value) => {
                if self.is_active() {
                    self.commit().await?;
                }
                Ok(value)
            }
            Err(e) => {
                if self.is_active() {
                    if let Err(rollback_error) = self.rollback().await {
                        warn!(
                            "Rollback of transaction {} failed: {}",
                            self.id(),
                            rollback_error
                        );
                    }
                }
                Err(e)
            }
        }
    }
}

/// Held across a commit or rollback request. Dropping it without
/// [`FinishGuard::complete`] returns the transaction to `Active`, including
/// when the request future is cancelled.
struct FinishGuard<'a> {
    transaction: &'a Transaction,
    outcome: Option<TransactionState>,
}

impl FinishGuard<'_> {
    fn complete(&mut self, state: TransactionState) {
        self.transaction.set_state(state);
        self.outcome = Some(state);
    }
}

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        if self.outcome.is_none() {
            self.transaction.set_state(TransactionState::Active);
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .finish()
    }
}

/// Maps a refused begin/commit/rollback to [`ThemisError::Transaction`].
/// Transport failures pass through unchanged.
fn refused_as_transaction_error(
    response: Result<HttpResponse>,
    url: &str,
    action: &str,
) -> Result<HttpResponse> {
    let refused = |status: u16, body: String| {
        ThemisError::Transaction(format!("{} failed: HTTP {}: {}", action, status, body))
    };
    match response {
        Ok(response) if response.is_success() => Ok(response),
        Ok(response) => Err(refused(response.status.as_u16(), response.text())),
        Err(ThemisError::HttpStatus { status, body, .. }) => Err(refused(status, body)),
        Err(e) => {
            debug!("{} request to {} failed: {}", action, url, e);
            Err(e)
        }
    }
}

fn require_transaction_id(id: Option<String>) -> Result<String> {
    id.filter(|id| !id.is_empty()).ok_or_else(|| {
        ThemisError::Protocol("begin response is missing transaction_id".to_string())
    })
}

impl ThemisClient {
    /// Opens a transaction on the first bootstrap endpoint.
    pub async fn begin_transaction(&self, options: TransactionOptions) -> Result<Transaction> {
        let url = self.resolver().primary()?.join(TRANSACTION_BEGIN_PATH);
        let request = HttpRequest::post(&url).json(&BeginTransactionRequest::from(&options))?;
        let response = refused_as_transaction_error(self.execute(request).await, &url, "begin")?;

        let body: BeginTransactionResponse = response.json_body()?;
        let id = require_transaction_id(body.transaction_id)?;
        info!(
            "Began transaction {} ({})",
            id, options.isolation_level
        );
        Ok(Transaction::new(self.clone(), id))
    }

    /// Begins a transaction and runs `f` in it with [`Transaction::scope`].
    pub async fn with_transaction<F, Fut, T, E>(
        &self,
        options: TransactionOptions,
        f: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce(Transaction) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<ThemisError>,
    {
        let transaction = self.begin_transaction(options).await?;
        transaction.scope(f).await
    }
}
