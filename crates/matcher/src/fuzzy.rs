use canonical::normalize;
use futures::future::try_join_all;
use reference::{Category, ReferenceError, ReferenceStore};

use crate::types::{Candidate, MatchHints};

/// Confidence that `candidate` is the entity meant by `query`.
///
/// | rule                                              | score |
/// |---------------------------------------------------|-------|
/// | equal ignoring case                               | 1.00  |
/// | equal after normalization                         | 0.95  |
/// | one contains the other after normalization        | 0.85  |
/// | candidate starts with the query, ignoring case    | 0.80  |
/// | any other hit returned by the store               | 0.70  |
pub fn score_candidate(query: &str, candidate: &str) -> f32 {
    let query_lower = query.trim().to_lowercase();
    let candidate_lower = candidate.trim().to_lowercase();
    if candidate_lower == query_lower {
        return 1.0;
    }

    let query_norm = normalize(query);
    let candidate_norm = normalize(candidate);
    if !query_norm.is_empty() && !candidate_norm.is_empty() {
        if query_norm == candidate_norm {
            return 0.95;
        }
        if candidate_norm.contains(&query_norm) || query_norm.contains(&candidate_norm) {
            return 0.85;
        }
    }

    if !query_lower.is_empty() && candidate_lower.starts_with(&query_lower) {
        return 0.80;
    }
    0.70
}

/// Name-contains search across every category the hints allow.
pub struct FuzzySearch<'a> {
    store: &'a dyn ReferenceStore,
    limit: usize,
}

impl<'a> FuzzySearch<'a> {
    pub fn new(store: &'a dyn ReferenceStore, limit: usize) -> Self {
        Self { store, limit }
    }

    /// Scored candidates, non-increasing in confidence, at most `limit`.
    ///
    /// Categories are queried concurrently; equal confidences keep category
    /// priority order, then store order.
    pub async fn search(
        &self,
        query: &str,
        hints: &MatchHints,
    ) -> Result<Vec<Candidate>, ReferenceError> {
        let filter = hints.filter();
        let categories: Vec<Category> = Category::ALL
            .into_iter()
            .filter(|category| hints.allows(*category))
            .collect();

        let per_category = try_join_all(categories.iter().map(|category| {
            self.store
                .search_by_name(*category, query, &filter, self.limit)
        }))
        .await?;

        let mut candidates: Vec<Candidate> = per_category
            .into_iter()
            .flatten()
            .map(|entity| {
                let confidence = score_candidate(query, &entity.nom);
                Candidate::from_entity(entity, confidence)
            })
            .collect();

        // Stable: ties keep the category enumeration order.
        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        candidates.truncate(self.limit);
        Ok(candidates)
    }
}
