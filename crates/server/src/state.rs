use crate::admission::AdmissionControl;
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::telemetry::PrometheusMatchMetrics;
use batch::{BatchCoordinator, CompletionNotifier, Dispatcher, InMemoryBatchStore, WebhookNotifier};
use metrics_exporter_prometheus::PrometheusHandle;
use matcher::Matcher;
use reference::{InMemoryReferenceStore, ReferenceSnapshot, ReferenceStore};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared application state
pub struct ServerState {
    /// Server configuration
    pub config: Arc<ServerConfig>,

    /// Single-request resolver (shared across requests)
    pub matcher: Arc<Matcher>,

    pub batches: BatchCoordinator,

    pub admission: AdmissionControl,

    /// Set when the global Prometheus recorder is installed.
    pub prometheus: Option<PrometheusHandle>,

    pub started_at: Instant,
}

impl ServerState {
    /// Build state over the snapshot named by `reference_data_path`, or an
    /// empty store when none is configured.
    pub fn new(config: ServerConfig) -> ServerResult<(Self, Dispatcher)> {
        let store = match &config.reference_data_path {
            Some(path) => {
                let snapshot = ReferenceSnapshot::from_json_file(path)?;
                let store = InMemoryReferenceStore::from_snapshot(snapshot);
                tracing::info!(path = %path.display(), "reference snapshot loaded");
                store
            }
            None => {
                tracing::warn!("No reference_data_path configured, starting with an empty store");
                InMemoryReferenceStore::new()
            }
        };
        Self::with_store(config, Arc::new(store))
    }

    /// Build state over an existing reference store.
    ///
    /// The returned [`Dispatcher`] must be driven for batches to run.
    pub fn with_store(
        config: ServerConfig,
        store: Arc<dyn ReferenceStore>,
    ) -> ServerResult<(Self, Dispatcher)> {
        config
            .validate()
            .map_err(|e| ServerError::Config(e.to_string()))?;

        let matcher = Matcher::with_config(store, config.matching.clone())
            .map_err(|e| ServerError::Config(e.to_string()))?
            .with_metrics(Arc::new(PrometheusMatchMetrics));
        let matcher = Arc::new(matcher);

        let notifier: Arc<dyn CompletionNotifier> = Arc::new(WebhookNotifier::new(
            Duration::from_secs(config.batch.webhook_timeout_secs),
        )?);
        let (batches, dispatcher) = BatchCoordinator::new(
            Arc::new(InMemoryBatchStore::new()),
            matcher.clone(),
            config.batch.clone(),
            Some(notifier),
        )?;

        let admission = AdmissionControl::from_config(config.admission.clone())?;

        let state = Self {
            config: Arc::new(config),
            matcher,
            batches,
            admission,
            prometheus: None,
            started_at: Instant::now(),
        };
        Ok((state, dispatcher))
    }

    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

/// Server metadata for health checks
#[derive(Debug, serde::Serialize)]
pub struct ServerMetadata {
    pub version: String,
    pub uptime_seconds: u64,
    pub reference_entities: usize,
}
