use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard};

use async_trait::async_trait;
use canonical::normalize;

use crate::snapshot::ReferenceSnapshot;
use crate::store::ReferenceStore;
use crate::types::{Alias, Category, Entity, SearchFilter};
use crate::ReferenceError;

struct IndexedEntity {
    entity: Entity,
    lowered: String,
    normalized: String,
}

#[derive(Default)]
struct Tables {
    /// Per category, keyed by code so scans are deterministic.
    entities: HashMap<Category, BTreeMap<String, IndexedEntity>>,
    aliases: Vec<Alias>,
    alias_by_text: HashMap<String, usize>,
    alias_by_normalized: HashMap<String, usize>,
}

/// Reference store held entirely in memory behind a `RwLock`.
#[derive(Default)]
pub struct InMemoryReferenceStore {
    tables: RwLock<Tables>,
}

impl InMemoryReferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: ReferenceSnapshot) -> Self {
        let (entities, aliases) = snapshot.into_parts();
        let store = Self::new();
        store.extend(entities, aliases);
        store
    }

    /// Insert or replace entities (by category and code) and append aliases.
    ///
    /// When two aliases share a text or normalized text, the first one
    /// inserted wins.
    pub fn extend(&self, entities: Vec<Entity>, aliases: Vec<Alias>) {
        let mut tables = self
            .tables
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for entity in entities {
            let indexed = IndexedEntity {
                lowered: entity.nom.to_lowercase(),
                normalized: normalize(&entity.nom),
                entity,
            };
            tables
                .entities
                .entry(indexed.entity.category)
                .or_default()
                .insert(indexed.entity.code.clone(), indexed);
        }
        for alias in aliases {
            let idx = tables.aliases.len();
            tables.alias_by_text.entry(alias.text.clone()).or_insert(idx);
            tables
                .alias_by_normalized
                .entry(alias.normalized_text.clone())
                .or_insert(idx);
            tables.aliases.push(alias);
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, ReferenceError> {
        self.tables
            .read()
            .map_err(|_| ReferenceError::unavailable("poisoned lock"))
    }
}

/// Ranking bucket for search results: exact normalized name, then prefix,
/// then any other containment.
fn search_rank(candidate: &str, fragment: &str) -> u8 {
    if candidate == fragment {
        0
    } else if candidate.starts_with(fragment) {
        1
    } else {
        2
    }
}

#[async_trait]
impl ReferenceStore for InMemoryReferenceStore {
    async fn find_by_code(
        &self,
        category: Category,
        code: &str,
    ) -> Result<Option<Entity>, ReferenceError> {
        let tables = self.read()?;
        Ok(tables
            .entities
            .get(&category)
            .and_then(|by_code| by_code.get(code))
            .map(|indexed| indexed.entity.clone()))
    }

    async fn find_by_name(
        &self,
        category: Category,
        name: &str,
    ) -> Result<Option<Entity>, ReferenceError> {
        let wanted = name.trim().to_lowercase();
        let tables = self.read()?;
        Ok(tables.entities.get(&category).and_then(|by_code| {
            by_code
                .values()
                .find(|indexed| indexed.lowered == wanted)
                .map(|indexed| indexed.entity.clone())
        }))
    }

    async fn search_by_name(
        &self,
        category: Category,
        fragment: &str,
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<Entity>, ReferenceError> {
        let fragment = normalize(fragment);
        if fragment.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let tables = self.read()?;
        let Some(by_code) = tables.entities.get(&category) else {
            return Ok(Vec::new());
        };
        let mut hits: Vec<(u8, &IndexedEntity)> = by_code
            .values()
            .filter(|indexed| indexed.normalized.contains(&fragment))
            .filter(|indexed| filter.admits(&indexed.entity))
            .map(|indexed| (search_rank(&indexed.normalized, &fragment), indexed))
            .collect();
        hits.sort_by_key(|(rank, _)| *rank);
        Ok(hits
            .into_iter()
            .take(limit)
            .map(|(_, indexed)| indexed.entity.clone())
            .collect())
    }

    async fn find_alias(&self, text: &str) -> Result<Option<Alias>, ReferenceError> {
        let tables = self.read()?;
        Ok(tables
            .alias_by_text
            .get(text)
            .map(|&idx| tables.aliases[idx].clone()))
    }

    async fn find_alias_normalized(
        &self,
        normalized: &str,
    ) -> Result<Option<Alias>, ReferenceError> {
        let tables = self.read()?;
        Ok(tables
            .alias_by_normalized
            .get(normalized)
            .map(|&idx| tables.aliases[idx].clone()))
    }

    async fn entity_count(&self) -> Result<usize, ReferenceError> {
        let tables = self.read()?;
        Ok(tables.entities.values().map(BTreeMap::len).sum())
    }
}
