//! # Territoires batch coordinator (`batch`)
//!
//! Resolves up to [`BatchConfig::max_items`] names per submission without
//! blocking the caller. A submission is validated and persisted as `pending`,
//! then queued; a [`Dispatcher`] claims queued batches and runs a bounded
//! number of them at once.
//!
//! While a batch runs:
//!
//! - items with the same normalized query and hints are grouped, and each
//!   group costs exactly one call to the resolver
//! - groups are resolved in chunks of [`BatchConfig::concurrency`]
//! - counters are updated after every chunk so progress can be polled
//!
//! Results are always returned ordered by input index. Batches expire after
//! [`BatchConfig::ttl_secs`] and are removed by [`BatchCoordinator::reap_expired`].
//!
//! Storage sits behind [`BatchStore`]; [`InMemoryBatchStore`] is the
//! process-local implementation. Counters are not shared between instances.

mod config;
mod coordinator;
mod notify;
mod store;
mod types;

pub use crate::config::{BatchConfig, MAX_TTL_SECS};
pub use crate::coordinator::{BatchCoordinator, Dispatcher};
pub use crate::notify::{CompletionNotifier, WebhookNotifier};
pub use crate::store::{BatchStore, InMemoryBatchStore};
pub use crate::types::{
    BatchCounters, BatchMatchItem, BatchMatchRequest, BatchResultSet, BatchResults, BatchStatus,
    BatchStatusReport, BatchSubmission, ItemStatus, SubmitReceipt,
};

use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the batch subsystem.
///
/// Individual item failures are not errors; they are recorded as failed
/// match results on the item.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BatchError {
    #[error("batch must contain at least one item")]
    Empty,
    #[error("batch exceeds the maximum of {max} items (got {got})")]
    TooManyItems { max: usize, got: usize },
    #[error("invalid webhook url: {0}")]
    InvalidWebhook(String),
    #[error("batch {0} not found")]
    NotFound(Uuid),
    #[error("batch queue is full")]
    QueueFull,
    #[error("batch queue is closed")]
    QueueClosed,
    #[error("batch store error: {0}")]
    Store(String),
    #[error("webhook delivery failed: {0}")]
    Webhook(String),
    #[error("invalid batch configuration: {0}")]
    InvalidConfig(String),
}

impl From<reqwest::Error> for BatchError {
    fn from(e: reqwest::Error) -> Self {
        BatchError::Webhook(e.to_string())
    }
}
