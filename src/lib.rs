//! Workspace umbrella crate for Territoires.
//!
//! Territoires resolves free-text names of French territorial entities
//! (regions, departements, communes, groupements) to their official codes.
//! This crate stitches the resolution crates together so callers can load a
//! reference snapshot, resolve names one at a time, and run batches through a
//! single entry point.
//!
//! ```no_run
//! use territoires::{MatchResult, Resolver, TerritoiresConfig};
//!
//! # async fn run() -> Result<(), territoires::TerritoiresError> {
//! let config = TerritoiresConfig::from_file("territoires.yaml")?;
//! let resolver = Resolver::from_config(config)?;
//! if let MatchResult::Matched(hit) = resolver.resolve_query("Côtes d'Armor").await {
//!     println!("{} -> {}", hit.nom, hit.code);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;

pub use crate::config::{ConfigLoadError, TerritoiresConfig};
pub use batch::{
    BatchConfig, BatchCoordinator, BatchCounters, BatchError, BatchMatchItem, BatchResultSet,
    BatchResults, BatchStatus, BatchStatusReport, BatchSubmission, CompletionNotifier, Dispatcher,
    InMemoryBatchStore, ItemStatus, SubmitReceipt,
};
pub use canonical::{canonical_code, normalize};
pub use matcher::{
    Candidate, MatchConfig, MatchError, MatchHints, MatchRequest, MatchResult, MatchSource,
    MatchedEntity, Matcher, QUERY_REQUIRED,
};
pub use reference::{
    Alias, Category, Entity, InMemoryReferenceStore, ReferenceError, ReferenceSnapshot,
    ReferenceStore,
};

#[cfg(feature = "server")]
pub use server;

use std::sync::Arc;
use thiserror::Error;

/// Errors raised while wiring a [`Resolver`].
///
/// Resolution itself never fails; see [`MatchResult::Failed`].
#[derive(Debug, Error)]
pub enum TerritoiresError {
    #[error(transparent)]
    Config(#[from] ConfigLoadError),
    #[error(transparent)]
    Reference(#[from] ReferenceError),
    #[error(transparent)]
    Match(#[from] MatchError),
    #[error(transparent)]
    Batch(#[from] BatchError),
}

/// In-process resolver over an in-memory reference store.
pub struct Resolver {
    store: Arc<InMemoryReferenceStore>,
    matcher: Arc<Matcher>,
    config: TerritoiresConfig,
}

impl Resolver {
    /// Load the snapshot named by `reference_data_path`, or start empty.
    pub fn from_config(config: TerritoiresConfig) -> Result<Self, TerritoiresError> {
        let store = match &config.reference_data_path {
            Some(path) => {
                let snapshot = ReferenceSnapshot::from_json_file(path)?;
                tracing::info!(path = %path.display(), "reference snapshot loaded");
                InMemoryReferenceStore::from_snapshot(snapshot)
            }
            None => {
                tracing::warn!("no reference_data_path configured, resolver starts empty");
                InMemoryReferenceStore::new()
            }
        };
        Self::with_store(Arc::new(store), config)
    }

    pub fn from_snapshot(
        snapshot: ReferenceSnapshot,
        config: TerritoiresConfig,
    ) -> Result<Self, TerritoiresError> {
        Self::with_store(Arc::new(InMemoryReferenceStore::from_snapshot(snapshot)), config)
    }

    pub fn with_store(
        store: Arc<InMemoryReferenceStore>,
        config: TerritoiresConfig,
    ) -> Result<Self, TerritoiresError> {
        let matcher = Matcher::with_config(store.clone(), config.matching.clone())?;
        Ok(Self {
            store,
            matcher: Arc::new(matcher),
            config,
        })
    }

    pub fn store(&self) -> &Arc<InMemoryReferenceStore> {
        &self.store
    }

    pub fn matcher(&self) -> &Arc<Matcher> {
        &self.matcher
    }

    pub fn config(&self) -> &TerritoiresConfig {
        &self.config
    }

    pub async fn resolve(&self, request: &MatchRequest) -> MatchResult {
        self.matcher.resolve(request).await
    }

    /// Resolve a bare query without hints.
    pub async fn resolve_query(&self, query: &str) -> MatchResult {
        self.resolve(&MatchRequest::new(query)).await
    }

    /// Build a batch coordinator over this resolver with an in-memory batch
    /// store. The returned [`Dispatcher`] must be driven for batches to run.
    pub fn batch_coordinator(
        &self,
        notifier: Option<Arc<dyn CompletionNotifier>>,
    ) -> Result<(BatchCoordinator, Dispatcher), TerritoiresError> {
        let pair = BatchCoordinator::new(
            Arc::new(InMemoryBatchStore::new()),
            self.matcher.clone(),
            self.config.batch.clone(),
            notifier,
        )?;
        Ok(pair)
    }
}
