use chrono::{DateTime, Utc};
use matcher::{MatchHints, MatchOutcome, MatchRequest, MatchResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a batch: `pending → processing → completed | failed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn is_terminal(self) -> bool {
        match self {
            BatchStatus::Completed | BatchStatus::Failed => true,
            BatchStatus::Pending | BatchStatus::Processing => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Processing => "processing",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
        }
    }
}

/// State of one item inside a batch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Matched,
    Suggestions,
    Failed,
}

impl From<MatchOutcome> for ItemStatus {
    fn from(outcome: MatchOutcome) -> Self {
        match outcome {
            MatchOutcome::Matched => ItemStatus::Matched,
            MatchOutcome::Suggestions => ItemStatus::Suggestions,
            MatchOutcome::Failed => ItemStatus::Failed,
        }
    }
}

/// Per-batch tallies, updated after each processed chunk.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchCounters {
    pub total: usize,
    pub processed: usize,
    pub matched: usize,
    pub suggestions: usize,
    pub failed: usize,
}

impl BatchCounters {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn record(&mut self, outcome: MatchOutcome) {
        self.processed += 1;
        match outcome {
            MatchOutcome::Matched => self.matched += 1,
            MatchOutcome::Suggestions => self.suggestions += 1,
            MatchOutcome::Failed => self.failed += 1,
        }
    }

    /// `round(100 * processed / total)`.
    pub fn progress(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let pct = (100.0 * self.processed as f64 / self.total as f64).round();
        pct.clamp(0.0, 100.0) as u8
    }

    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.processed)
    }
}

/// Parent record of a submitted batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BatchMatchRequest {
    #[serde(rename = "requestId")]
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    pub status: BatchStatus,
    pub counters: BatchCounters,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

impl BatchMatchRequest {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn report(&self) -> BatchStatusReport {
        BatchStatusReport {
            progress: self.counters.progress(),
            request: self.clone(),
        }
    }
}

/// One name to resolve, owned by its parent batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BatchMatchItem {
    pub input_index: usize,
    pub query: String,
    #[serde(default)]
    pub hints: MatchHints,
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<MatchResult>,
}

impl BatchMatchItem {
    pub fn pending(input_index: usize, request: MatchRequest) -> Self {
        Self {
            input_index,
            query: request.query,
            hints: request.hints,
            status: ItemStatus::Pending,
            result: None,
        }
    }

    pub fn request(&self) -> MatchRequest {
        MatchRequest {
            query: self.query.clone(),
            hints: self.hints.clone(),
        }
    }

    pub fn resolve_with(&mut self, result: MatchResult) {
        self.status = result.outcome().into();
        self.result = Some(result);
    }
}

/// Body of a batch submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BatchSubmission {
    pub items: Vec<MatchRequest>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

/// Acknowledgement returned once a submission is persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceipt {
    pub request_id: Uuid,
    pub status: BatchStatus,
    pub total_items: usize,
    /// Seconds.
    pub estimated_duration: u64,
}

/// Status of a batch plus its rounded completion percentage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchStatusReport {
    #[serde(flatten)]
    pub request: BatchMatchRequest,
    pub progress: u8,
}

/// Full per-item outcome of a finished batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BatchResultSet {
    pub request_id: Uuid,
    pub status: BatchStatus,
    pub summary: BatchCounters,
    /// Sorted by `input_index`.
    pub items: Vec<BatchMatchItem>,
}

/// Answer to a results query.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchResults {
    Ready(BatchResultSet),
    /// Still pending or processing; no partial data is exposed.
    NotReady {
        status: BatchStatus,
        progress: u8,
        retry_after_secs: u64,
    },
}
