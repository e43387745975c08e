use canonical::canonical_code;
use reference::{Category, Entity, ReferenceStore};
use tracing::warn;

/// Recognizes queries that are official codes.
///
/// The token length selects the candidate categories (2 → region or
/// departement, 3 → departement, 5 → commune, 9 → groupement), which are
/// probed in priority order. The first entity found wins.
pub struct CodeValidator<'a> {
    store: &'a dyn ReferenceStore,
}

impl<'a> CodeValidator<'a> {
    pub fn new(store: &'a dyn ReferenceStore) -> Self {
        Self { store }
    }

    /// Look `input` up as a code in every applicable category.
    pub async fn validate(&self, input: &str) -> Option<Entity> {
        self.validate_in(input, None).await
    }

    /// Look `input` up as a code, optionally in a single category.
    ///
    /// Never fails: store errors are logged and treated as a miss so the
    /// caller falls through to the next tier.
    pub async fn validate_in(&self, input: &str, only: Option<Category>) -> Option<Entity> {
        let code = canonical_code(input)?;
        let len = code.len();
        for category in Category::ALL {
            if only.is_some_and(|wanted| wanted != category) {
                continue;
            }
            if !category.accepts_code_len(len) {
                continue;
            }
            match self.store.find_by_code(category, &code).await {
                Ok(Some(entity)) => return Some(entity),
                Ok(None) => {}
                Err(err) => {
                    warn!(code = %code, category = %category, error = %err, "code lookup failed");
                }
            }
        }
        None
    }
}
