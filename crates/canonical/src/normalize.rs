use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Canonical comparison form of a name.
///
/// Lowercases, decomposes (NFKD), drops combining marks and keeps only
/// alphanumeric characters. Ligatures common in French place names (`œ`, `æ`)
/// are expanded so they survive the filter.
///
/// Lowercasing happens before decomposition: some uppercase letters lowercase
/// into a base letter plus a combining mark, which must then be stripped for
/// the function to stay idempotent.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    for ch in lowered.nfkd() {
        if is_combining_mark(ch) {
            continue;
        }
        match ch {
            'œ' => out.push_str("oe"),
            'æ' => out.push_str("ae"),
            c if c.is_alphanumeric() => out.push(c),
            _ => {}
        }
    }
    out
}
