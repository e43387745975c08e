use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference category of a territorial entity.
///
/// Variant order is the resolution priority order used everywhere: code
/// probing, direct-name lookups and tie-breaking between fuzzy hits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Region,
    #[serde(alias = "department")]
    Departement,
    Commune,
    #[serde(alias = "epci", alias = "syndicat", alias = "siren")]
    Groupement,
}

impl Category {
    /// All categories in priority order.
    pub const ALL: [Category; 4] = [
        Category::Region,
        Category::Departement,
        Category::Commune,
        Category::Groupement,
    ];

    /// Whether a code of `len` characters can belong to this category.
    ///
    /// Regions use 2 characters, departements 2 or 3 (`01`, `2A`, `971`),
    /// communes 5 (INSEE) and groupements 9 (SIREN).
    pub fn accepts_code_len(self, len: usize) -> bool {
        match self {
            Category::Region => len == 2,
            Category::Departement => (2..=3).contains(&len),
            Category::Commune => len == 5,
            Category::Groupement => len == 9,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Region => "region",
            Category::Departement => "departement",
            Category::Commune => "commune",
            Category::Groupement => "groupement",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A territorial entity as held by the reference store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entity {
    /// Official code (INSEE, or SIREN for groupements).
    pub code: String,
    pub nom: String,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departement_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_code: Option<String>,
    /// Legal nature of a groupement (`CC`, `CA`, `SIE`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nature: Option<String>,
}

/// A curated non-canonical name pointing at one official code.
///
/// Aliases carry the code only. Name and category are always re-read from the
/// entity itself so authoritative data lives in one place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Alias {
    pub text: String,
    pub normalized_text: String,
    pub target_code: String,
    /// Where the alias came from (`manual`, `import:sirene`, ...).
    pub source_tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_hint: Option<Category>,
}

impl Alias {
    pub fn new(
        text: impl Into<String>,
        target_code: impl Into<String>,
        source_tag: impl Into<String>,
    ) -> Self {
        let text = text.into();
        Self {
            normalized_text: canonical::normalize(&text),
            text,
            target_code: target_code.into(),
            source_tag: source_tag.into(),
            category_hint: None,
        }
    }

    pub fn with_category_hint(mut self, category: Category) -> Self {
        self.category_hint = Some(category);
        self
    }
}

/// Geographic constraints applied to name searches.
///
/// A constraint only applies to categories that carry the attribute: a
/// departement filter does not restrict regions.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SearchFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl SearchFilter {
    pub fn is_empty(&self) -> bool {
        self.departement.is_none() && self.region.is_none()
    }

    /// Whether `entity` satisfies every applicable constraint.
    pub fn admits(&self, entity: &Entity) -> bool {
        let departement_ok = match (&self.departement, entity.category) {
            (None, _) | (Some(_), Category::Region) => true,
            (Some(wanted), Category::Departement) => entity.code.eq_ignore_ascii_case(wanted),
            (Some(wanted), _) => entity
                .departement_code
                .as_deref()
                .is_some_and(|code| code.eq_ignore_ascii_case(wanted)),
        };
        let region_ok = match (&self.region, entity.category) {
            (None, _) => true,
            (Some(wanted), Category::Region) => entity.code.eq_ignore_ascii_case(wanted),
            (Some(wanted), _) => entity
                .region_code
                .as_deref()
                .is_some_and(|code| code.eq_ignore_ascii_case(wanted)),
        };
        departement_ok && region_ok
    }
}
