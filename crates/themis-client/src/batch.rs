//! Batch entity operations.
//!
//! A batch resolves the topology once, then runs its items either in input
//! order on the calling task or on a pool of worker tasks that lives only for
//! the duration of the call. Workers pull items from a shared queue and report
//! `(index, outcome)` pairs back over a channel, so results are matched to
//! their ids regardless of completion order.

use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use themis_common::{BatchGetResult, BatchWriteResult, Endpoint, EntityRef, Result, ThemisError};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::client::ThemisClient;

/// Worker count used when `max_workers` is not configured.
pub const DEFAULT_BATCH_WORKERS: usize = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOptions {
    /// Return the first per-item error instead of recording it, discarding
    /// any partial results.
    pub raise_on_error: bool,
}

impl BatchOptions {
    pub fn raise_on_error() -> Self {
        Self {
            raise_on_error: true,
        }
    }
}

/// Number of workers for a batch of `item_count` items.
pub fn worker_count(max_workers: Option<usize>, item_count: usize) -> usize {
    if item_count == 0 {
        return 1;
    }
    max_workers
        .unwrap_or(DEFAULT_BATCH_WORKERS)
        .min(item_count)
        .max(1)
}

type Outcome<R> = (usize, Result<R>);

impl ThemisClient {
    pub(crate) fn batch_worker_count(&self, item_count: usize) -> usize {
        worker_count(self.config().max_workers, item_count)
    }

    /// Single items, custom transports and one-worker configurations run
    /// sequentially.
    pub(crate) fn should_parallelize(&self, item_count: usize) -> bool {
        if item_count <= 1 || self.has_custom_transport() {
            return false;
        }
        self.batch_worker_count(item_count) > 1
    }

    /// Reads several entities of one collection.
    ///
    /// Every id ends up in exactly one of `found`, `missing` or `errors`.
    /// Repeated ids are fetched once.
    pub async fn batch_get<I, S>(
        &self,
        model: &str,
        collection: &str,
        ids: I,
        options: BatchOptions,
    ) -> Result<BatchGetResult>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let jobs: Vec<(String, EntityRef)> = ids
            .into_iter()
            .map(Into::into)
            .map(|id: String| (id.clone(), self.entity(model, collection, &id)))
            .collect();

        let outcomes = self
            .run_batch(jobs, options, |client, shards, entity: EntityRef| async move {
                client.get_routed(&shards, &entity, None).await
            })
            .await?;

        let mut result = BatchGetResult::default();
        for (id, outcome) in outcomes {
            match outcome {
                Ok(Some(value)) => {
                    result.found.insert(id, value);
                }
                Ok(None) => result.missing.push(id),
                Err(e) => {
                    result.errors.insert(id, e.to_string());
                }
            }
        }
        Ok(result)
    }

    /// Writes several entities of one collection.
    ///
    /// When an id appears more than once, only its first value is written.
    pub async fn batch_put<I, K, V>(
        &self,
        model: &str,
        collection: &str,
        items: I,
        options: BatchOptions,
    ) -> Result<BatchWriteResult>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Serialize,
    {
        let jobs: Vec<(String, (EntityRef, Result<Value>))> = items
            .into_iter()
            .map(|(id, value)| {
                let id: String = id.into();
                let entity = self.entity(model, collection, &id);
                let value = serde_json::to_value(&value).map_err(ThemisError::from);
                (id, (entity, value))
            })
            .collect();

        let outcomes = self
            .run_batch(
                jobs,
                options,
                |client, shards, (entity, value): (EntityRef, Result<Value>)| async move {
                    client.put_routed(&shards, &entity, &value?, None).await
                },
            )
            .await?;

        Ok(write_result(outcomes, "entity was not stored"))
    }

    /// Deletes several entities of one collection. Ids that did not exist are
    /// reported as failed.
    pub async fn batch_delete<I, S>(
        &self,
        model: &str,
        collection: &str,
        ids: I,
        options: BatchOptions,
    ) -> Result<BatchWriteResult>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let jobs: Vec<(String, EntityRef)> = ids
            .into_iter()
            .map(Into::into)
            .map(|id: String| (id.clone(), self.entity(model, collection, &id)))
            .collect();

        let outcomes = self
            .run_batch(jobs, options, |client, shards, entity: EntityRef| async move {
                client.delete_routed(&shards, &entity, None).await
            })
            .await?;

        Ok(write_result(outcomes, "entity not found"))
    }

    /// Runs `op` for every distinct id and returns `(id, outcome)` pairs in
    /// first-seen order.
    async fn run_batch<T, R, F, Fut>(
        &self,
        jobs: Vec<(String, T)>,
        options: BatchOptions,
        op: F,
    ) -> Result<Vec<(String, Result<R>)>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(ThemisClient, Arc<Vec<Endpoint>>, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        if jobs.is_empty() {
            return Ok(Vec::new());
        }

        let shards = self.ensure_topology().await;
        let (ids, payloads): (Vec<String>, Vec<T>) = dedup_jobs(jobs).into_iter().unzip();

        let outcomes = if self.should_parallelize(ids.len()) {
            let workers = self.batch_worker_count(ids.len());
            debug!("Running batch of {} item(s) on {} worker(s)", ids.len(), workers);
            self.run_parallel(payloads, workers, shards, options, op).await?
        } else {
            debug!("Running batch of {} item(s) sequentially", ids.len());
            let mut outcomes = Vec::with_capacity(payloads.len());
            for payload in payloads {
                match op(self.clone(), shards.clone(), payload).await {
                    Err(e) if options.raise_on_error => return Err(e),
                    outcome => outcomes.push(outcome),
                }
            }
            outcomes
        };

        Ok(ids.into_iter().zip(outcomes).collect())
    }

    async fn run_parallel<T, R, F, Fut>(
        &self,
        payloads: Vec<T>,
        workers: usize,
        shards: Arc<Vec<Endpoint>>,
        options: BatchOptions,
        op: F,
    ) -> Result<Vec<Result<R>>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(ThemisClient, Arc<Vec<Endpoint>>, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        let total = payloads.len();
        let queue = Arc::new(Mutex::new(
            payloads.into_iter().enumerate().collect::<VecDeque<_>>(),
        ));
        let op = Arc::new(op);
        let (tx, mut rx) = mpsc::unbounded_channel::<Outcome<R>>();

        let mut pool = JoinSet::new();
        for _ in 0..workers {
            let queue = queue.clone();
            let op = op.clone();
            let tx = tx.clone();
            let client = self.clone();
            let shards = shards.clone();
            pool.spawn(async move {
                loop {
                    let next = queue.lock().await.pop_front();
                    let Some((index, payload)) = next else {
                        break;
                    };
                    let outcome = (*op)(client.clone(), shards.clone(), payload).await;
                    if tx.send((index, outcome)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        let mut slots: Vec<Option<Result<R>>> = (0..total).map(|_| None).collect();
        while let Some((index, outcome)) = rx.recv().await {
            match outcome {
                Err(e) if options.raise_on_error => {
                    pool.abort_all();
                    return Err(e);
                }
                outcome => slots[index] = Some(outcome),
            }
        }

        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                warn!("Batch worker terminated abnormally: {}", e);
            }
        }

        let mut outcomes = Vec::with_capacity(total);
        for slot in slots {
            match slot {
                Some(outcome) => outcomes.push(outcome),
                None => {
                    let e = ThemisError::Execution("batch worker exited before completing the item".to_string());
                    if options.raise_on_error {
                        return Err(e);
                    }
                    outcomes.push(Err(e));
                }
            }
        }
        Ok(outcomes)
    }
}

/// Drops jobs whose id was already seen, keeping the first occurrence.
fn dedup_jobs<T>(jobs: Vec<(String, T)>) -> Vec<(String, T)> {
    let total = jobs.len();
    let mut seen = HashSet::with_capacity(total);
    let unique: Vec<(String, T)> = jobs
        .into_iter()
        .filter(|(id, _)| seen.insert(id.clone()))
        .collect();
    if unique.len() < total {
        debug!("Dropped {} duplicate id(s) from batch", total - unique.len());
    }
    unique
}

fn write_result(outcomes: Vec<(String, Result<bool>)>, rejected: &str) -> BatchWriteResult {
    let mut result = BatchWriteResult::default();
    for (id, outcome) in outcomes {
        match outcome {
            Ok(true) => result.succeeded.push(id),
            Ok(false) => {
                result.failed.insert(id, rejected.to_string());
            }
            Err(e) => {
                result.failed.insert(id, e.to_string());
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_count() {
        assert_eq!(worker_count(None, 0), 1);
        assert_eq!(worker_count(None, 1), 1);
        assert_eq!(worker_count(None, 3), 3);
        assert_eq!(worker_count(None, 100), 4);
        assert_eq!(worker_count(Some(16), 10), 10);
        assert_eq!(worker_count(Some(2), 10), 2);
        assert_eq!(worker_count(Some(0), 10), 1);
    }

    #[test]
    fn test_dedup_jobs_keeps_first_occurrence() {
        let jobs = vec![
            ("b".to_string(), 1),
            ("a".to_string(), 2),
            ("b".to_string(), 3),
            ("c".to_string(), 4),
            ("a".to_string(), 5),
        ];
        let unique = dedup_jobs(jobs);
        assert_eq!(
            unique,
            vec![("b".to_string(), 1), ("a".to_string(), 2), ("c".to_string(), 4)]
        );
    }

    #[test]
    fn test_write_result_buckets() {
        let outcomes = vec![
            ("a".to_string(), Ok(true)),
            ("b".to_string(), Ok(false)),
            ("c".to_string(), Err(ThemisError::Transport("refused".to_string()))),
        ];
        let result = write_result(outcomes, "entity not found");
        assert_eq!(result.succeeded, vec!["a".to_string()]);
        assert_eq!(result.failed["b"], "entity not found");
        assert!(result.failed["c"].contains("refused"));
        assert_eq!(result.len(), 3);
    }

    #[tokio::test]
    async fn test_should_parallelize() {
        use crate::config::ClientConfig;

        let client = ThemisClient::new(ClientConfig::new(["http://a"])).unwrap();
        assert!(!client.should_parallelize(0));
        assert!(!client.should_parallelize(1));
        assert!(client.should_parallelize(2));

        let client = ThemisClient::new(ClientConfig::new(["http://a"]).with_max_workers(1)).unwrap();
        assert!(!client.should_parallelize(10));
    }
}
