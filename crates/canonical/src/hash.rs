//! Hashing helpers.
//!
//! ```rust
//! use canonical::hash_text;
//!
//! let hash = hash_text("hello world");
//! assert_eq!(hash.len(), 64);
//! assert_eq!(hash, hash_text("hello world"));
//! ```

use sha2::{Digest, Sha256};

/// Hash arbitrary text with SHA-256 and return a lowercase hex digest.
pub fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}
