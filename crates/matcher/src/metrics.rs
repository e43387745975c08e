// Metrics hooks for the `matcher` crate.
//
// Attach a `MatchMetrics` implementation with `Matcher::with_metrics` and the
// matcher reports latency and outcome for each call to `Matcher::resolve`,
// keeping instrumentation decoupled from any specific metrics backend.
use std::time::Duration;

use crate::types::{MatchOutcome, MatchSource};

/// Metrics observer for resolutions.
pub trait MatchMetrics: Send + Sync {
    /// `source` is set for matched outcomes only.
    fn record_match(&self, outcome: MatchOutcome, source: Option<MatchSource>, latency: Duration);
}
