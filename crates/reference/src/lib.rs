//! # Territoires reference store
//!
//! The resolver never owns territorial data. It reads it through the
//! [`ReferenceStore`] trait, which mirrors what the upstream reference
//! database offers:
//!
//! - lookup by official code, per [`Category`]
//! - case-insensitive name equality
//! - name-contains search with departement/region filters
//! - alias lookup, exact and normalized
//!
//! [`InMemoryReferenceStore`] implements the trait over a
//! [`ReferenceSnapshot`], typically loaded from a JSON export at startup.
//! Reads take a shared lock and never await while holding it.
//!
//! ```
//! use reference::{Category, InMemoryReferenceStore, ReferenceSnapshot, ReferenceStore};
//!
//! let snapshot: ReferenceSnapshot = serde_json::from_str(r#"{
//!     "regions": [{ "code": "84", "nom": "Auvergne-Rhône-Alpes" }],
//!     "communes": [{ "code": "69123", "nom": "Lyon", "departement_code": "69", "region_code": "84" }]
//! }"#).unwrap();
//! let store = InMemoryReferenceStore::from_snapshot(snapshot);
//!
//! let rt = tokio::runtime::Runtime::new().unwrap();
//! let lyon = rt.block_on(store.find_by_code(Category::Commune, "69123")).unwrap();
//! assert_eq!(lyon.unwrap().nom, "Lyon");
//! ```

mod memory;
mod snapshot;
mod store;
mod types;

pub use crate::memory::InMemoryReferenceStore;
pub use crate::snapshot::{AliasRecord, EntityRecord, ReferenceSnapshot};
pub use crate::store::ReferenceStore;
pub use crate::types::{Alias, Category, Entity, SearchFilter};

use thiserror::Error;

/// Errors raised by a reference store.
///
/// The matcher converts all of these into failed outcomes; they never reach
/// an API caller verbatim.
#[derive(Error, Debug, Clone)]
pub enum ReferenceError {
    #[error("reference store unavailable: {0}")]
    Unavailable(String),
    #[error("invalid reference snapshot: {0}")]
    Snapshot(String),
    #[error("io error: {0}")]
    Io(String),
}

impl ReferenceError {
    pub fn unavailable<E: std::fmt::Display>(err: E) -> Self {
        Self::Unavailable(err.to_string())
    }
}

impl From<std::io::Error> for ReferenceError {
    fn from(e: std::io::Error) -> Self {
        ReferenceError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for ReferenceError {
    fn from(e: serde_json::Error) -> Self {
        ReferenceError::Snapshot(e.to_string())
    }
}
