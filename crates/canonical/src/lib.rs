//! Territoires canonical text layer.
//!
//! Everything the resolver compares goes through this crate first: entity
//! names, alias texts, free-text queries and official codes.
//!
//! ## What we do
//!
//! - [`normalize`]: lowercase, strip diacritics, drop everything that is not
//!   alphanumeric. `"Côtes-d'Armor"` and `"cotes d armor"` both become
//!   `"cotesdarmor"`.
//! - [`canonical_code`]: turn a token that may be an official code into its
//!   stored form (`" 2a "` becomes `"2A"`), or reject it.
//! - [`collapse_whitespace`]: tidy a query before exact comparisons.
//! - [`hash_text`]: SHA-256 hex digest, used for credential fingerprints.
//!
//! ## Pure function guarantee
//!
//! No I/O, no clock calls, no locale dependence. Same input, same output on
//! any machine, and `normalize(normalize(x)) == normalize(x)`.

mod code;
mod hash;
mod normalize;
mod whitespace;

pub use crate::code::{canonical_code, MAX_CODE_LEN};
pub use crate::hash::hash_text;
pub use crate::normalize::normalize;
pub use crate::whitespace::collapse_whitespace;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accents_case_and_punctuation_are_ignored() {
        assert_eq!(normalize("Côtes-d'Armor"), normalize("cotes d armor"));
        assert_eq!(normalize("Côtes-d'Armor"), "cotesdarmor");
        assert_eq!(normalize("  ÎLE-DE-FRANCE "), "iledefrance");
    }

    #[test]
    fn normalize_is_idempotent() {
        let inputs = [
            "Auvergne-Rhône-Alpes",
            "Saint-Étienne",
            "L'Haÿ-les-Roses",
            "Œuvres de l'État",
            "Syndicat d'énergie (SDE 35)",
            "İstanbul",
            "",
            "   ",
        ];
        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn empty_and_symbol_only_inputs_normalize_to_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(" -'/ "), "");
    }

    #[test]
    fn codes_are_trimmed_and_uppercased() {
        assert_eq!(canonical_code(" 2a "), Some("2A".to_string()));
        assert_eq!(canonical_code("84"), Some("84".to_string()));
        assert_eq!(canonical_code("200046977"), Some("200046977".to_string()));
        assert_eq!(canonical_code("Lyon 3"), None);
        assert_eq!(canonical_code(""), None);
        assert_eq!(canonical_code("1234567890"), None);
    }
}
