use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::{Alias, Category, Entity};
use crate::ReferenceError;

/// One entity as written in a snapshot file. The category is implied by the
/// list the record appears in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityRecord {
    pub code: String,
    pub nom: String,
    #[serde(default)]
    pub departement_code: Option<String>,
    #[serde(default)]
    pub region_code: Option<String>,
    #[serde(default)]
    pub nature: Option<String>,
}

impl EntityRecord {
    fn into_entity(self, category: Category) -> Entity {
        Entity {
            code: self.code,
            nom: self.nom,
            category,
            departement_code: self.departement_code,
            region_code: self.region_code,
            nature: self.nature,
        }
    }
}

/// One alias as written in a snapshot file. The normalized text is derived
/// on load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AliasRecord {
    pub text: String,
    pub target_code: String,
    #[serde(default = "default_source_tag")]
    pub source_tag: String,
    #[serde(default)]
    pub category_hint: Option<Category>,
}

fn default_source_tag() -> String {
    "snapshot".to_string()
}

/// Serialized export of the reference data.
///
/// ```json
/// {
///   "regions": [{ "code": "84", "nom": "Auvergne-Rhône-Alpes" }],
///   "departements": [{ "code": "69", "nom": "Rhône", "region_code": "84" }],
///   "communes": [{ "code": "69123", "nom": "Lyon", "departement_code": "69", "region_code": "84" }],
///   "groupements": [{ "code": "200046977", "nom": "Métropole de Lyon", "nature": "MET69" }],
///   "aliases": [{ "text": "Grand Lyon", "target_code": "200046977" }]
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferenceSnapshot {
    #[serde(default)]
    pub regions: Vec<EntityRecord>,
    #[serde(default)]
    pub departements: Vec<EntityRecord>,
    #[serde(default)]
    pub communes: Vec<EntityRecord>,
    #[serde(default)]
    pub groupements: Vec<EntityRecord>,
    #[serde(default)]
    pub aliases: Vec<AliasRecord>,
}

impl ReferenceSnapshot {
    /// Read and parse a JSON snapshot from disk.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ReferenceError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let snapshot = Self::from_json(&content)?;
        info!(
            path = %path.display(),
            entities = snapshot.entity_count(),
            aliases = snapshot.aliases.len(),
            "reference snapshot read"
        );
        Ok(snapshot)
    }

    /// Entities across all four categories.
    pub fn entity_count(&self) -> usize {
        self.lists().iter().map(|(_, records)| records.len()).sum()
    }

    pub fn from_json(json: &str) -> Result<Self, ReferenceError> {
        let snapshot: ReferenceSnapshot = serde_json::from_str(json)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    fn validate(&self) -> Result<(), ReferenceError> {
        for (category, records) in self.lists() {
            for record in records {
                let len = record.code.trim().len();
                if !category.accepts_code_len(len) {
                    return Err(ReferenceError::Snapshot(format!(
                        "{category} code '{}' has invalid length {len}",
                        record.code
                    )));
                }
                if record.nom.trim().is_empty() {
                    return Err(ReferenceError::Snapshot(format!(
                        "{category} '{}' has an empty name",
                        record.code
                    )));
                }
            }
        }
        Ok(())
    }

    fn lists(&self) -> [(Category, &Vec<EntityRecord>); 4] {
        [
            (Category::Region, &self.regions),
            (Category::Departement, &self.departements),
            (Category::Commune, &self.communes),
            (Category::Groupement, &self.groupements),
        ]
    }

    /// Flatten into entities (in category order) and aliases.
    pub fn into_parts(self) -> (Vec<Entity>, Vec<Alias>) {
        let mut entities = Vec::with_capacity(
            self.regions.len() + self.departements.len() + self.communes.len() + self.groupements.len(),
        );
        let lists = [
            (Category::Region, self.regions),
            (Category::Departement, self.departements),
            (Category::Commune, self.communes),
            (Category::Groupement, self.groupements),
        ];
        for (category, records) in lists {
            entities.extend(records.into_iter().map(|r| r.into_entity(category)));
        }
        let aliases = self
            .aliases
            .into_iter()
            .map(|record| {
                let alias = Alias::new(record.text, record.target_code, record.source_tag);
                match record.category_hint {
                    Some(category) => alias.with_category_hint(category),
                    None => alias,
                }
            })
            .collect();
        (entities, aliases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "regions": [{ "code": "84", "nom": "Auvergne-Rhône-Alpes" }],
        "communes": [{ "code": "69123", "nom": "Lyon", "departement_code": "69", "region_code": "84" }],
        "aliases": [{ "text": "Lyon Ville", "target_code": "69123", "category_hint": "commune" }]
    }"#;

    #[test]
    fn parses_and_flattens() {
        let snapshot = ReferenceSnapshot::from_json(SAMPLE).expect("valid snapshot");
        let (entities, aliases) = snapshot.into_parts();
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].category, Category::Region);
        assert_eq!(entities[1].category, Category::Commune);
        assert_eq!(aliases[0].normalized_text, "lyonville");
        assert_eq!(aliases[0].source_tag, "snapshot");
        assert_eq!(aliases[0].category_hint, Some(Category::Commune));
    }

    #[test]
    fn rejects_bad_code_length() {
        let res = ReferenceSnapshot::from_json(r#"{ "communes": [{ "code": "691", "nom": "X" }] }"#);
        assert!(matches!(res, Err(ReferenceError::Snapshot(_))));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(SAMPLE.as_bytes()).expect("write");
        let snapshot = ReferenceSnapshot::from_json_file(file.path()).expect("load");
        assert_eq!(snapshot.communes.len(), 1);
        assert_eq!(snapshot.entity_count(), 2);
    }

    #[test]
    fn missing_file_is_io_error() {
        let res = ReferenceSnapshot::from_json_file("/definitely/not/here.json");
        assert!(matches!(res, Err(ReferenceError::Io(_))));
    }
}
