//! Whitespace normalization.
//!
//! ```rust
//! use canonical::collapse_whitespace;
//!
//! assert_eq!(collapse_whitespace("  Saint   Malo \n"), "Saint Malo");
//! assert_eq!(collapse_whitespace("   \t "), "");
//! ```

/// Collapses repeated Unicode whitespace into single ASCII spaces and trims
/// both ends. Case and accents are left untouched.
pub fn collapse_whitespace(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    for segment in text.split_whitespace() {
        if !normalized.is_empty() {
            normalized.push(' ');
        }
        normalized.push_str(segment);
    }
    normalized
}
