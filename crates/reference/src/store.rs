use async_trait::async_trait;

use crate::types::{Alias, Category, Entity, SearchFilter};
use crate::ReferenceError;

/// Read-only access to the territorial reference data.
///
/// Implementations must be safe for concurrent reads. Every method may fail
/// with [`ReferenceError::Unavailable`] when the backing store is unreachable.
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    /// Entity of `category` whose official code is exactly `code`.
    async fn find_by_code(
        &self,
        category: Category,
        code: &str,
    ) -> Result<Option<Entity>, ReferenceError>;

    /// Entity of `category` whose name equals `name`, ignoring case.
    async fn find_by_name(
        &self,
        category: Category,
        name: &str,
    ) -> Result<Option<Entity>, ReferenceError>;

    /// Entities of `category` whose name contains `fragment`, at most `limit`
    /// of them, best candidates first.
    async fn search_by_name(
        &self,
        category: Category,
        fragment: &str,
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<Entity>, ReferenceError>;

    /// Alias whose text is exactly `text`.
    async fn find_alias(&self, text: &str) -> Result<Option<Alias>, ReferenceError>;

    /// Alias whose normalized text is `normalized`.
    async fn find_alias_normalized(
        &self,
        normalized: &str,
    ) -> Result<Option<Alias>, ReferenceError>;

    /// Total number of entities, used by readiness probes.
    async fn entity_count(&self) -> Result<usize, ReferenceError>;
}
