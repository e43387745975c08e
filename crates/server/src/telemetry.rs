//! Prometheus wiring.
//!
//! Counters are emitted through the `metrics` facade; they are no-ops until
//! [`install_recorder`] runs, which the binary does once at startup.

use std::time::Duration;

use matcher::{MatchMetrics, MatchOutcome, MatchSource};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder and return its render handle.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    Ok(handle)
}

/// Records each resolution as `match_requests_total{outcome,source}` plus a
/// latency histogram.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrometheusMatchMetrics;

impl MatchMetrics for PrometheusMatchMetrics {
    fn record_match(&self, outcome: MatchOutcome, source: Option<MatchSource>, latency: Duration) {
        let source = source.map(MatchSource::as_str).unwrap_or("none");
        metrics::counter!(
            "match_requests_total",
            "outcome" => outcome.as_str(),
            "source" => source
        )
        .increment(1);
        metrics::histogram!("match_duration_seconds").record(latency.as_secs_f64());
    }
}
