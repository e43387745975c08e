use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use matcher::MatchResult;
use uuid::Uuid;

use crate::types::{BatchCounters, BatchMatchItem, BatchMatchRequest, BatchStatus};
use crate::BatchError;

/// Persistence for batches and their items.
///
/// Implementations must apply [`BatchStore::record_results`] atomically per
/// batch: item results and counter increments become visible together.
#[async_trait]
pub trait BatchStore: Send + Sync {
    async fn insert(
        &self,
        request: BatchMatchRequest,
        items: Vec<BatchMatchItem>,
    ) -> Result<(), BatchError>;

    async fn get(&self, id: Uuid) -> Result<Option<BatchMatchRequest>, BatchError>;

    /// Items of a batch, sorted by input index.
    async fn items(&self, id: Uuid) -> Result<Vec<BatchMatchItem>, BatchError>;

    async fn mark_processing(&self, id: Uuid, started_at: DateTime<Utc>) -> Result<(), BatchError>;

    /// Store results keyed by input index and bump the parent counters.
    async fn record_results(
        &self,
        id: Uuid,
        results: Vec<(usize, MatchResult)>,
    ) -> Result<BatchCounters, BatchError>;

    /// Move a batch to a terminal status and return the final record.
    async fn finish(
        &self,
        id: Uuid,
        status: BatchStatus,
        completed_at: DateTime<Utc>,
    ) -> Result<BatchMatchRequest, BatchError>;

    /// Batches submitted by `client_id`, newest first.
    async fn list_by_client(&self, client_id: &str) -> Result<Vec<BatchMatchRequest>, BatchError>;

    /// Drop every batch whose expiry is at or before `now`.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize, BatchError>;
}

struct BatchRecord {
    request: BatchMatchRequest,
    items: Vec<BatchMatchItem>,
}

/// Process-local batch store.
#[derive(Default)]
pub struct InMemoryBatchStore {
    batches: DashMap<Uuid, BatchRecord>,
}

impl InMemoryBatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

#[async_trait]
impl BatchStore for InMemoryBatchStore {
    async fn insert(
        &self,
        request: BatchMatchRequest,
        mut items: Vec<BatchMatchItem>,
    ) -> Result<(), BatchError> {
        items.sort_by_key(|item| item.input_index);
        self.batches
            .insert(request.id, BatchRecord { request, items });
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<BatchMatchRequest>, BatchError> {
        Ok(self.batches.get(&id).map(|record| record.request.clone()))
    }

    async fn items(&self, id: Uuid) -> Result<Vec<BatchMatchItem>, BatchError> {
        self.batches
            .get(&id)
            .map(|record| record.items.clone())
            .ok_or(BatchError::NotFound(id))
    }

    async fn mark_processing(&self, id: Uuid, started_at: DateTime<Utc>) -> Result<(), BatchError> {
        let mut record = self.batches.get_mut(&id).ok_or(BatchError::NotFound(id))?;
        record.request.status = BatchStatus::Processing;
        record.request.started_at = Some(started_at);
        Ok(())
    }

    async fn record_results(
        &self,
        id: Uuid,
        results: Vec<(usize, MatchResult)>,
    ) -> Result<BatchCounters, BatchError> {
        let mut guard = self.batches.get_mut(&id).ok_or(BatchError::NotFound(id))?;
        let record = &mut *guard;
        for (index, result) in results {
            // Items are stored sorted and indexed from zero.
            let item = record
                .items
                .get_mut(index)
                .filter(|item| item.input_index == index)
                .ok_or_else(|| BatchError::Store(format!("batch {id} has no item {index}")))?;
            record.request.counters.record(result.outcome());
            item.resolve_with(result);
        }
        Ok(record.request.counters)
    }

    async fn finish(
        &self,
        id: Uuid,
        status: BatchStatus,
        completed_at: DateTime<Utc>,
    ) -> Result<BatchMatchRequest, BatchError> {
        let mut record = self.batches.get_mut(&id).ok_or(BatchError::NotFound(id))?;
        record.request.status = status;
        record.request.completed_at = Some(completed_at);
        Ok(record.request.clone())
    }

    async fn list_by_client(&self, client_id: &str) -> Result<Vec<BatchMatchRequest>, BatchError> {
        let mut requests: Vec<BatchMatchRequest> = self
            .batches
            .iter()
            .filter(|record| record.request.client_id.as_deref() == Some(client_id))
            .map(|record| record.request.clone())
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize, BatchError> {
        let before = self.batches.len();
        self.batches.retain(|_, record| !record.request.is_expired(now));
        Ok(before.saturating_sub(self.batches.len()))
    }
}
