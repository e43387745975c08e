use reference::{Category, Entity, SearchFilter};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Caller-supplied context narrowing the fuzzy search.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MatchHints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Restrict the search to a single category.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
}

impl MatchHints {
    pub fn filter(&self) -> SearchFilter {
        SearchFilter {
            departement: self.departement.clone(),
            region: self.region.clone(),
        }
    }

    /// Whether `category` is searched under these hints.
    pub fn allows(&self, category: Category) -> bool {
        self.category.is_none_or(|wanted| wanted == category)
    }
}

/// A single resolution request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchRequest {
    pub query: String,
    #[serde(default)]
    pub hints: MatchHints,
}

impl MatchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            hints: MatchHints::default(),
        }
    }

    pub fn with_hints(mut self, hints: MatchHints) -> Self {
        self.hints = hints;
        self
    }
}

/// Which tier produced a match.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MatchSource {
    /// The query was an official code.
    Direct,
    /// Curated alias or exact name.
    Alias,
    /// Fuzzy name search.
    Database,
}

impl MatchSource {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchSource::Direct => "direct",
            MatchSource::Alias => "alias",
            MatchSource::Database => "database",
        }
    }
}

/// A scored entity proposed by the fuzzy search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    pub code: String,
    pub nom: String,
    #[serde(rename = "type")]
    pub category: Category,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departement_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_code: Option<String>,
}

impl Candidate {
    pub fn from_entity(entity: Entity, confidence: f32) -> Self {
        Self {
            code: entity.code,
            nom: entity.nom,
            category: entity.category,
            confidence,
            departement_code: entity.departement_code,
            region_code: entity.region_code,
        }
    }
}

/// Payload of a successful resolution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchedEntity {
    pub code: String,
    pub nom: String,
    #[serde(rename = "type")]
    pub category: Category,
    pub confidence: f32,
    pub source: MatchSource,
}

impl MatchedEntity {
    pub fn from_entity(entity: Entity, confidence: f32, source: MatchSource) -> Self {
        Self {
            code: entity.code,
            nom: entity.nom,
            category: entity.category,
            confidence,
            source,
        }
    }

    pub(crate) fn from_candidate(candidate: Candidate, source: MatchSource) -> Self {
        Self {
            code: candidate.code,
            nom: candidate.nom,
            category: candidate.category,
            confidence: candidate.confidence,
            source,
        }
    }
}

/// Terminal outcome of a resolution. Exactly one variant is ever produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MatchResult {
    Matched(MatchedEntity),
    Suggestions { alternatives: Vec<Candidate> },
    Failed { message: String },
}

/// Variant discriminant of a [`MatchResult`], for counters and logs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    Matched,
    Suggestions,
    Failed,
}

impl MatchOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchOutcome::Matched => "matched",
            MatchOutcome::Suggestions => "suggestions",
            MatchOutcome::Failed => "failed",
        }
    }
}

impl MatchResult {
    pub fn failed(message: impl Into<String>) -> Self {
        MatchResult::Failed {
            message: message.into(),
        }
    }

    pub fn outcome(&self) -> MatchOutcome {
        match self {
            MatchResult::Matched(_) => MatchOutcome::Matched,
            MatchResult::Suggestions { .. } => MatchOutcome::Suggestions,
            MatchResult::Failed { .. } => MatchOutcome::Failed,
        }
    }

    pub fn source(&self) -> Option<MatchSource> {
        match self {
            MatchResult::Matched(hit) => Some(hit.source),
            MatchResult::Suggestions { .. } | MatchResult::Failed { .. } => None,
        }
    }
}

/// Tuning knobs of the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchConfig {
    /// Maximum number of fuzzy candidates kept after merging categories.
    #[serde(default = "MatchConfig::default_limit")]
    pub limit: usize,
    /// A fuzzy top hit at or above this confidence is accepted outright.
    #[serde(default = "MatchConfig::default_auto_accept")]
    pub auto_accept_confidence: f32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            limit: Self::default_limit(),
            auto_accept_confidence: Self::default_auto_accept(),
        }
    }
}

impl MatchConfig {
    pub(crate) fn default_limit() -> usize {
        5
    }

    pub(crate) fn default_auto_accept() -> f32 {
        0.9
    }

    pub fn validate(&self) -> Result<(), MatchError> {
        if self.limit == 0 {
            return Err(MatchError::InvalidConfig("limit must be >= 1".into()));
        }
        if !(0.0..=1.0).contains(&self.auto_accept_confidence) {
            return Err(MatchError::InvalidConfig(
                "auto_accept_confidence must be within [0, 1]".into(),
            ));
        }
        Ok(())
    }
}

/// Errors surfaced while building a matcher. Resolution itself never fails.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MatchError {
    #[error("invalid match configuration: {0}")]
    InvalidConfig(String),
}
