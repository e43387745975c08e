use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use canonical::collapse_whitespace;
use reference::ReferenceStore;
use tracing::{debug, warn};

use crate::alias::AliasResolver;
use crate::code::CodeValidator;
use crate::fuzzy::FuzzySearch;
use crate::metrics::MatchMetrics;
use crate::types::{MatchConfig, MatchError, MatchRequest, MatchResult, MatchSource, MatchedEntity};
use crate::{QUERY_REQUIRED, SEARCH_UNAVAILABLE};


/// Anything that turns a [`MatchRequest`] into a [`MatchResult`].
///
/// The batch coordinator depends on this seam rather than on [`Matcher`].
#[async_trait]
pub trait Resolve: Send + Sync {
    async fn resolve(&self, request: &MatchRequest) -> MatchResult;
}

/// Match orchestrator: code → alias → fuzzy search.
///
/// Stateless between calls; a shared instance serves concurrent requests.
pub struct Matcher {
    store: Arc<dyn ReferenceStore>,
    cfg: MatchConfig,
    metrics: Option<Arc<dyn MatchMetrics>>,
}

impl Matcher {
    /// Matcher with the default configuration.
    pub fn new(store: Arc<dyn ReferenceStore>) -> Self {
        Self {
            store,
            cfg: MatchConfig::default(),
            metrics: None,
        }
    }

    pub fn with_config(store: Arc<dyn ReferenceStore>, cfg: MatchConfig) -> Result<Self, MatchError> {
        cfg.validate()?;
        Ok(Self {
            store,
            cfg,
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MatchMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &MatchConfig {
        &self.cfg
    }

    pub fn store(&self) -> &Arc<dyn ReferenceStore> {
        &self.store
    }

    /// Resolve one request to its terminal outcome.
    pub async fn resolve(&self, req: &MatchRequest) -> MatchResult {
        let start = Instant::now();
        let result = self.run_tiers(req).await;
        if let Some(recorder) = &self.metrics {
            recorder.record_match(result.outcome(), result.source(), start.elapsed());
        }
        result
    }

    async fn run_tiers(&self, req: &MatchRequest) -> MatchResult {
        let query = collapse_whitespace(&req.query);
        if query.is_empty() {
            return MatchResult::failed(QUERY_REQUIRED);
        }
        let store = self.store.as_ref();
        let validator = CodeValidator::new(store);

        if let Some(entity) = validator.validate(&query).await {
            debug!(query = %query, code = %entity.code, "resolved as official code");
            return MatchResult::Matched(MatchedEntity::from_entity(entity, 1.0, MatchSource::Direct));
        }

        if let Some(hit) = AliasResolver::new(store).resolve(&query).await {
            match validator.validate_in(&hit.code, hit.category).await {
                Some(entity) => {
                    debug!(query = %query, code = %entity.code, via = ?hit.via, "resolved through alias");
                    return MatchResult::Matched(MatchedEntity::from_entity(
                        entity,
                        hit.confidence,
                        MatchSource::Alias,
                    ));
                }
                // Stale alias: degrade to the fuzzy tier.
                None => warn!(query = %query, code = %hit.code, "alias targets an unknown code"),
            }
        }

        let search = FuzzySearch::new(store, self.cfg.limit);
        let mut candidates = match search.search(&query, &req.hints).await {
            Ok(candidates) => candidates,
            Err(err) => {
                warn!(query = %query, error = %err, "fuzzy search failed");
                return MatchResult::failed(SEARCH_UNAVAILABLE);
            }
        };

        match candidates.len() {
            0 => MatchResult::failed(format!("No match found for '{query}'")),
            1 => MatchResult::Matched(MatchedEntity::from_candidate(
                candidates.remove(0),
                MatchSource::Database,
            )),
            _ if candidates[0].confidence >= self.cfg.auto_accept_confidence => {
                MatchResult::Matched(MatchedEntity::from_candidate(
                    candidates.remove(0),
                    MatchSource::Database,
                ))
            }
            _ => MatchResult::Suggestions {
                alternatives: candidates,
            },
        }
    }
}

#[async_trait]
impl Resolve for Matcher {
    async fn resolve(&self, request: &MatchRequest) -> MatchResult {
        Matcher::resolve(self, request).await
    }
}
