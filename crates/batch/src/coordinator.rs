use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use canonical::normalize;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use matcher::{MatchRequest, MatchResult, Resolve};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::BatchConfig;
use crate::notify::{check_webhook_url, CompletionNotifier};
use crate::store::BatchStore;
use crate::types::{
    BatchCounters, BatchMatchItem, BatchMatchRequest, BatchResultSet, BatchResults, BatchStatus,
    BatchStatusReport, BatchSubmission, SubmitReceipt,
};
use crate::BatchError;

#[cfg(test)]
mod tests;

/// Accepts submissions and answers status and results queries.
///
/// Cheap to clone; clones share the queue and the store.
#[derive(Clone)]
pub struct BatchCoordinator {
    worker: Arc<Worker>,
    queue: mpsc::Sender<Uuid>,
}

/// Claims accepted batches from the queue and runs them.
pub struct Dispatcher {
    worker: Arc<Worker>,
    queue: mpsc::Receiver<Uuid>,
    permits: Arc<Semaphore>,
}

struct Worker {
    store: Arc<dyn BatchStore>,
    resolver: Arc<dyn Resolve>,
    notifier: Option<Arc<dyn CompletionNotifier>>,
    cfg: BatchConfig,
}

/// Items sharing a normalized query and hints; resolved once.
struct Group {
    request: MatchRequest,
    indices: Vec<usize>,
}

/// Key under which duplicate lookups collapse.
///
/// Queries with no alphanumeric content are keyed by their trimmed text: an
/// empty query and a punctuation-only one resolve to different failures.
fn dedup_key(request: &MatchRequest) -> String {
    let hints = serde_json::to_string(&request.hints).unwrap_or_default();
    let normalized = normalize(&request.query);
    if normalized.is_empty() {
        format!("\u{1e}{}\u{1f}{}", request.query.trim(), hints)
    } else {
        format!("{normalized}\u{1f}{hints}")
    }
}

/// Group items by [`dedup_key`], in order of first appearance.
fn group_items(items: &[BatchMatchItem]) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();
    let mut by_key: HashMap<String, usize> = HashMap::new();
    for item in items {
        let request = item.request();
        let key = dedup_key(&request);
        match by_key.get(&key) {
            Some(&slot) => groups[slot].indices.push(item.input_index),
            None => {
                by_key.insert(key, groups.len());
                groups.push(Group {
                    request,
                    indices: vec![item.input_index],
                });
            }
        }
    }
    groups
}

impl BatchCoordinator {
    /// Build a coordinator and the dispatcher that drains its queue.
    ///
    /// Nothing runs until the dispatcher is driven, usually with
    /// [`Dispatcher::spawn`].
    pub fn new(
        store: Arc<dyn BatchStore>,
        resolver: Arc<dyn Resolve>,
        cfg: BatchConfig,
        notifier: Option<Arc<dyn CompletionNotifier>>,
    ) -> Result<(Self, Dispatcher), BatchError> {
        cfg.validate()?;
        let (tx, rx) = mpsc::channel(cfg.queue_capacity);
        let permits = Arc::new(Semaphore::new(cfg.max_concurrent_batches));
        let worker = Arc::new(Worker {
            store,
            resolver,
            notifier,
            cfg,
        });
        let coordinator = Self {
            worker: worker.clone(),
            queue: tx,
        };
        let dispatcher = Dispatcher {
            worker,
            queue: rx,
            permits,
        };
        Ok((coordinator, dispatcher))
    }

    pub fn config(&self) -> &BatchConfig {
        &self.worker.cfg
    }

    /// Validate, persist as pending, and queue a batch.
    ///
    /// Rejections happen before anything is stored or queued.
    pub async fn submit(&self, submission: BatchSubmission) -> Result<SubmitReceipt, BatchError> {
        let cfg = &self.worker.cfg;
        let total = submission.items.len();
        if total == 0 {
            return Err(BatchError::Empty);
        }
        if total > cfg.max_items {
            return Err(BatchError::TooManyItems {
                max: cfg.max_items,
                got: total,
            });
        }
        if let Some(url) = &submission.webhook_url {
            check_webhook_url(url)?;
        }

        let now = Utc::now();
        let expires_at = cfg.expiry_from(now)?;

        let slot = self.queue.try_reserve().map_err(|err| match err {
            mpsc::error::TrySendError::Full(()) => BatchError::QueueFull,
            mpsc::error::TrySendError::Closed(()) => BatchError::QueueClosed,
        })?;

        let id = Uuid::new_v4();
        let request = BatchMatchRequest {
            id,
            client_id: submission.client_id,
            webhook_url: submission.webhook_url,
            status: BatchStatus::Pending,
            counters: BatchCounters::new(total),
            created_at: now,
            started_at: None,
            completed_at: None,
            expires_at,
        };
        let items = submission
            .items
            .into_iter()
            .enumerate()
            .map(|(index, item)| BatchMatchItem::pending(index, item))
            .collect();

        self.worker.store.insert(request, items).await?;
        slot.send(id);
        info!(batch_id = %id, total_items = total, "batch accepted");

        Ok(SubmitReceipt {
            request_id: id,
            status: BatchStatus::Pending,
            total_items: total,
            estimated_duration: cfg.estimate_secs(total),
        })
    }

    pub async fn status(&self, id: Uuid) -> Result<BatchStatusReport, BatchError> {
        let request = self
            .worker
            .store
            .get(id)
            .await?
            .ok_or(BatchError::NotFound(id))?;
        Ok(request.report())
    }

    /// Full results once the batch is terminal, otherwise a retry hint.
    ///
    /// A failed batch is terminal too: its results hold whatever items were
    /// resolved before the failure.
    pub async fn results(&self, id: Uuid) -> Result<BatchResults, BatchError> {
        let request = self
            .worker
            .store
            .get(id)
            .await?
            .ok_or(BatchError::NotFound(id))?;
        if !request.status.is_terminal() {
            return Ok(BatchResults::NotReady {
                status: request.status,
                progress: request.counters.progress(),
                retry_after_secs: self.worker.cfg.estimate_secs(request.counters.remaining()),
            });
        }
        let mut items = self.worker.store.items(id).await?;
        items.sort_by_key(|item| item.input_index);
        Ok(BatchResults::Ready(BatchResultSet {
            request_id: id,
            status: request.status,
            summary: request.counters,
            items,
        }))
    }

    pub async fn list_by_client(&self, client_id: &str) -> Result<Vec<BatchStatusReport>, BatchError> {
        let requests = self.worker.store.list_by_client(client_id).await?;
        Ok(requests.iter().map(BatchMatchRequest::report).collect())
    }

    /// Delete batches whose expiry is at or before `now`.
    pub async fn reap_expired(&self, now: DateTime<Utc>) -> Result<usize, BatchError> {
        let reaped = self.worker.store.delete_expired(now).await?;
        if reaped > 0 {
            info!(reaped, "expired batches removed");
        }
        Ok(reaped)
    }

    /// Run [`Self::reap_expired`] every `reap_interval_secs`.
    pub fn spawn_reaper(&self) -> JoinHandle<()> {
        let coordinator = self.clone();
        let period = Duration::from_secs(self.worker.cfg.reap_interval_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                if let Err(err) = coordinator.reap_expired(Utc::now()).await {
                    warn!(error = %err, "batch reaper failed");
                }
            }
        })
    }
}

impl Dispatcher {
    /// Drain the queue until every coordinator handle is dropped, running at
    /// most `max_concurrent_batches` batches at a time.
    pub async fn run(mut self) {
        while let Some(id) = self.queue.recv().await {
            let permit = match self.permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let worker = self.worker.clone();
            tokio::spawn(async move {
                let _permit = permit;
                worker.run_guarded(id).await;
            });
        }
        debug!("batch queue closed, dispatcher exiting");
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Claim the next queued batch and run it to completion on the current
    /// task. Returns `None` once the queue is closed and empty.
    pub async fn run_next(&mut self) -> Option<Uuid> {
        let id = self.queue.recv().await?;
        self.worker.clone().run_guarded(id).await;
        Some(id)
    }
}

impl Worker {
    /// Run a batch on its own task so that a panic while coordinating marks
    /// the batch failed instead of leaving it processing.
    async fn run_guarded(self: Arc<Self>, id: Uuid) {
        let worker = self.clone();
        let outcome = tokio::spawn(async move { worker.process(id).await }).await;
        let status = match outcome {
            Ok(Ok(())) => BatchStatus::Completed,
            Ok(Err(err)) => {
                error!(batch_id = %id, error = %err, "batch processing failed");
                BatchStatus::Failed
            }
            Err(join) => {
                error!(batch_id = %id, error = %join, "batch task aborted");
                BatchStatus::Failed
            }
        };
        self.finish(id, status).await;
    }

    async fn process(&self, id: Uuid) -> Result<(), BatchError> {
        self.store.mark_processing(id, Utc::now()).await?;
        let items = self.store.items(id).await?;
        let groups = group_items(&items);
        info!(
            batch_id = %id,
            items = items.len(),
            unique = groups.len(),
            "batch processing started"
        );

        for chunk in groups.chunks(self.cfg.concurrency) {
            let results: Vec<MatchResult> =
                join_all(chunk.iter().map(|group| self.resolver.resolve(&group.request))).await;

            let updates: Vec<(usize, MatchResult)> = chunk
                .iter()
                .zip(results)
                .flat_map(|(group, result)| {
                    group
                        .indices
                        .iter()
                        .map(move |&index| (index, result.clone()))
                })
                .collect();

            let counters = self.store.record_results(id, updates).await?;
            debug!(
                batch_id = %id,
                processed = counters.processed,
                total = counters.total,
                "chunk recorded"
            );
        }
        Ok(())
    }

    async fn finish(&self, id: Uuid, status: BatchStatus) {
        let request = match self.store.finish(id, status, Utc::now()).await {
            Ok(request) => request,
            Err(err) => {
                warn!(batch_id = %id, error = %err, "could not finalize batch");
                return;
            }
        };
        info!(
            batch_id = %id,
            status = status.as_str(),
            matched = request.counters.matched,
            suggestions = request.counters.suggestions,
            failed = request.counters.failed,
            "batch finished"
        );

        if let (Some(url), Some(notifier)) = (&request.webhook_url, &self.notifier) {
            if let Err(err) = notifier.notify(url, &request.report()).await {
                warn!(batch_id = %id, error = %err, "webhook delivery failed");
            }
        }
    }
}
