/// Longest official code handled (SIREN).
pub const MAX_CODE_LEN: usize = 9;

/// Canonical form of a token that could be an official code.
///
/// Codes are ASCII alphanumeric and stored uppercase (Corsican departements
/// are `2A` and `2B`). Returns `None` for anything that cannot be a code:
/// empty input, inner whitespace or punctuation, or more than
/// [`MAX_CODE_LEN`] characters.
pub fn canonical_code(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_CODE_LEN {
        return None;
    }
    if !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(trimmed.to_ascii_uppercase())
}
