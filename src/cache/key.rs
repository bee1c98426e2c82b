//! Content-addressed cache keys.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::types::Category;

/// Key of a cached completion: SHA-256 of the message text and category tag.
///
/// Deterministic across processes, so the same key can address a shared
/// backend later.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    digest: String,
    category: Category,
}

impl CacheKey {
    /// Lowercase hex SHA-256 digest (64 characters).
    pub fn as_str(&self) -> &str {
        &self.digest
    }

    pub fn category(&self) -> Category {
        self.category
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.digest)
    }
}

/// Compute the cache key for a message under a category.
///
/// The message is hashed verbatim (no trimming or case folding) so only
/// byte-identical messages share an entry.
pub fn compute_key(message: &str, category: Category) -> CacheKey {
    let mut hasher = Sha256::new();
    hasher.update(message.as_bytes());
    // unit separator keeps "ab"+"c" and "a"+"bc" apart
    hasher.update([0x1f]);
    hasher.update(category.as_str().as_bytes());
    CacheKey {
        digest: hex::encode(hasher.finalize()),
        category,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_deterministic() {
        let k1 = compute_key("olá", Category::Factual);
        let k2 = compute_key("olá", Category::Factual);
        assert_eq!(k1, k2);
        assert_eq!(k1.as_str().len(), 64);
    }

    #[test]
    fn key_differs_on_category() {
        let k1 = compute_key("olá", Category::Factual);
        let k2 = compute_key("olá", Category::Creative);
        assert_ne!(k1.as_str(), k2.as_str());
    }

    #[test]
    fn key_differs_on_message() {
        let k1 = compute_key("olá", Category::Factual);
        let k2 = compute_key("Olá", Category::Factual);
        assert_ne!(k1, k2);
    }

    #[test]
    fn key_is_lowercase_hex() {
        let key = compute_key("x", Category::Technical);
        assert!(key.as_str().chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
    }
}
