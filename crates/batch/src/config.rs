use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::BatchError;

/// Longest batch retention accepted, ten years.
pub const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Batch subsystem settings. Every field has a serde default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchConfig {
    /// Largest accepted submission.
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    /// Resolution calls in flight per batch.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Lifetime of a batch after submission.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Accepted batches waiting for the dispatcher.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Batches running at the same time.
    #[serde(default = "default_max_concurrent_batches")]
    pub max_concurrent_batches: usize,
    /// Expected wall time of one chunk, used for duration estimates.
    #[serde(default = "default_estimated_ms_per_chunk")]
    pub estimated_ms_per_chunk: u64,
    #[serde(default = "default_reap_interval_secs")]
    pub reap_interval_secs: u64,
    #[serde(default = "default_webhook_timeout_secs")]
    pub webhook_timeout_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_items: default_max_items(),
            concurrency: default_concurrency(),
            ttl_secs: default_ttl_secs(),
            queue_capacity: default_queue_capacity(),
            max_concurrent_batches: default_max_concurrent_batches(),
            estimated_ms_per_chunk: default_estimated_ms_per_chunk(),
            reap_interval_secs: default_reap_interval_secs(),
            webhook_timeout_secs: default_webhook_timeout_secs(),
        }
    }
}

impl BatchConfig {
    pub fn validate(&self) -> Result<(), BatchError> {
        let positive = [
            ("max_items", self.max_items),
            ("concurrency", self.concurrency),
            ("queue_capacity", self.queue_capacity),
            ("max_concurrent_batches", self.max_concurrent_batches),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(BatchError::InvalidConfig(format!("{name} must be >= 1")));
            }
        }
        if self.ttl_secs == 0 || self.ttl_secs > MAX_TTL_SECS {
            return Err(BatchError::InvalidConfig(format!(
                "ttl_secs must be within [1, {MAX_TTL_SECS}]"
            )));
        }
        Ok(())
    }

    /// Expiry instant of a batch created at `created_at`.
    pub fn expiry_from(&self, created_at: DateTime<Utc>) -> Result<DateTime<Utc>, BatchError> {
        i64::try_from(self.ttl_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|ttl| created_at.checked_add_signed(ttl))
            .ok_or_else(|| BatchError::InvalidConfig("ttl_secs out of range".into()))
    }

    /// Seconds needed to resolve `items` more items, at least 1.
    pub fn estimate_secs(&self, items: usize) -> u64 {
        let chunks = items.div_ceil(self.concurrency.max(1)) as u64;
        let millis = chunks.saturating_mul(self.estimated_ms_per_chunk);
        millis.div_ceil(1000).max(1)
    }
}

fn default_max_items() -> usize {
    1000
}

fn default_concurrency() -> usize {
    10
}

fn default_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_queue_capacity() -> usize {
    256
}

fn default_max_concurrent_batches() -> usize {
    4
}

fn default_estimated_ms_per_chunk() -> u64 {
    500
}

fn default_reap_interval_secs() -> u64 {
    300
}

fn default_webhook_timeout_secs() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = BatchConfig::default();
        assert_eq!(cfg.max_items, 1000);
        assert_eq!(cfg.concurrency, 10);
        assert_eq!(cfg.ttl_secs, 86_400);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let cfg: BatchConfig = serde_json::from_str(r#"{ "concurrency": 4 }"#).unwrap();
        assert_eq!(cfg.concurrency, 4);
        assert_eq!(cfg.max_items, 1000);
    }

    #[test]
    fn estimate_rounds_up_to_whole_seconds() {
        let cfg = BatchConfig::default();
        assert_eq!(cfg.estimate_secs(1), 1);
        assert_eq!(cfg.estimate_secs(25), 2);
        assert_eq!(cfg.estimate_secs(1000), 50);
    }

    #[test]
    fn ttl_is_bounded() {
        let cfg = BatchConfig {
            ttl_secs: 10_000_000_000_000,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(BatchError::InvalidConfig(_))));
        assert!(cfg.expiry_from(Utc::now()).is_err());

        let cfg = BatchConfig {
            ttl_secs: MAX_TTL_SECS,
            ..Default::default()
        };
        assert!(cfg.validate().is_ok());
        let now = Utc::now();
        assert!(cfg.expiry_from(now).unwrap() > now);
    }

    #[test]
    fn default_expiry_is_one_day_later() {
        let now = Utc::now();
        let expires = BatchConfig::default().expiry_from(now).unwrap();
        assert_eq!((expires - now).num_seconds(), 86_400);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let cfg = BatchConfig {
            concurrency: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(BatchError::InvalidConfig(_))));
    }
}
