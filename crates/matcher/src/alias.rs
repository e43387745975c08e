use canonical::normalize;
use reference::{Category, ReferenceStore};
use tracing::warn;

/// How an [`AliasHit`] was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasVia {
    ExactAlias,
    NormalizedAlias,
    DirectName,
}

/// Code found by the alias tier. It still has to be re-resolved through the
/// [`CodeValidator`](crate::CodeValidator) to obtain the canonical entity.
#[derive(Debug, Clone, PartialEq)]
pub struct AliasHit {
    pub code: String,
    pub confidence: f32,
    pub category: Option<Category>,
    pub via: AliasVia,
}

pub(crate) const EXACT_ALIAS_CONFIDENCE: f32 = 1.0;
pub(crate) const NORMALIZED_ALIAS_CONFIDENCE: f32 = 0.95;
pub(crate) const DIRECT_NAME_CONFIDENCE: f32 = 1.0;

/// Resolves free text through the curated alias table.
///
/// Attempts, first success wins:
/// 1. alias text equal to the query (confidence 1.0)
/// 2. alias normalized text equal to the normalized query (0.95)
/// 3. entity name equal to the query ignoring case, per category in
///    priority order (1.0, category inferred)
pub struct AliasResolver<'a> {
    store: &'a dyn ReferenceStore,
}

impl<'a> AliasResolver<'a> {
    pub fn new(store: &'a dyn ReferenceStore) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, query: &str) -> Option<AliasHit> {
        match self.store.find_alias(query).await {
            Ok(Some(alias)) => {
                return Some(AliasHit {
                    code: alias.target_code,
                    confidence: EXACT_ALIAS_CONFIDENCE,
                    category: alias.category_hint,
                    via: AliasVia::ExactAlias,
                })
            }
            Ok(None) => {}
            Err(err) => warn!(error = %err, "exact alias lookup failed"),
        }

        let normalized = normalize(query);
        if !normalized.is_empty() {
            match self.store.find_alias_normalized(&normalized).await {
                Ok(Some(alias)) => {
                    return Some(AliasHit {
                        code: alias.target_code,
                        confidence: NORMALIZED_ALIAS_CONFIDENCE,
                        category: alias.category_hint,
                        via: AliasVia::NormalizedAlias,
                    })
                }
                Ok(None) => {}
                Err(err) => warn!(error = %err, "normalized alias lookup failed"),
            }
        }

        for category in Category::ALL {
            match self.store.find_by_name(category, query).await {
                Ok(Some(entity)) => {
                    return Some(AliasHit {
                        code: entity.code,
                        confidence: DIRECT_NAME_CONFIDENCE,
                        category: Some(category),
                        via: AliasVia::DirectName,
                    })
                }
                Ok(None) => {}
                Err(err) => warn!(category = %category, error = %err, "name lookup failed"),
            }
        }
        None
    }
}
