//! # Territoires Matcher (`matcher`)
//!
//! ## Purpose
//!
//! Turns a free-text name ("Lyon", "Côtes d'Armor", "SDE 35", "84") into the
//! official code of a French territorial entity, with a confidence score, or
//! into a short list of ranked alternatives when the text is ambiguous.
//!
//! Resolution is tiered; cheap and certain sources run first and always
//! outrank probabilistic ones:
//!
//! 1. [`CodeValidator`]: the query is itself an official code.
//! 2. [`AliasResolver`]: curated alias table, then direct name equality.
//! 3. [`FuzzySearch`]: name-contains search across categories, scored.
//!
//! [`Matcher`] sequences the tiers and always produces exactly one
//! [`MatchResult`]; reference-store failures are reported as
//! [`MatchResult::Failed`] and never escape.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use matcher::{MatchRequest, MatchResult, Matcher};
//! use reference::{Category, Entity, InMemoryReferenceStore};
//!
//! let store = InMemoryReferenceStore::new();
//! store.extend(
//!     vec![Entity {
//!         code: "69123".into(),
//!         nom: "Lyon".into(),
//!         category: Category::Commune,
//!         departement_code: Some("69".into()),
//!         region_code: Some("84".into()),
//!         nature: None,
//!     }],
//!     vec![],
//! );
//! let matcher = Matcher::new(Arc::new(store));
//!
//! let rt = tokio::runtime::Runtime::new().unwrap();
//! match rt.block_on(matcher.resolve(&MatchRequest::new("lyon"))) {
//!     MatchResult::Matched(hit) => assert_eq!(hit.code, "69123"),
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```
//!
//! ## Observability
//!
//! Attach a [`MatchMetrics`] implementation with [`Matcher::with_metrics`] to
//! record per-request latency and outcome.

mod alias;
mod code;
pub mod engine;
mod fuzzy;
pub mod metrics;
pub mod types;

pub use crate::alias::{AliasHit, AliasResolver, AliasVia};
pub use crate::code::CodeValidator;
pub use crate::engine::{Matcher, Resolve};
pub use crate::fuzzy::{score_candidate, FuzzySearch};
pub use crate::metrics::MatchMetrics;
pub use crate::types::{
    Candidate, MatchConfig, MatchError, MatchHints, MatchOutcome, MatchRequest, MatchResult,
    MatchSource, MatchedEntity,
};

/// Message of the failed outcome for an empty query.
pub const QUERY_REQUIRED: &str = "Query is required";
/// Message of the failed outcome when the reference store cannot be searched.
pub const SEARCH_UNAVAILABLE: &str = "Search service temporarily unavailable";
