use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use canonical::hash_text;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::error::ServerError;

/// A configured API key. Only the SHA-256 hex digest of the key is stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiKeyConfig {
    pub name: String,
    /// Lowercase hex SHA-256 of the key.
    pub hash: String,
    /// Overrides the authenticated quota for this key.
    #[serde(default)]
    pub rate_limit_per_minute: Option<u32>,
}

impl ApiKeyConfig {
    pub fn validate(&self) -> Result<(), ServerError> {
        let well_formed = self.hash.len() == 64
            && self
                .hash
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !well_formed {
            return Err(ServerError::Config(format!(
                "api key '{}' must be a lowercase hex SHA-256 digest",
                self.name
            )));
        }
        Ok(())
    }
}

/// Key owner resolved from a presented credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyRecord {
    pub name: String,
    pub rate_limit_per_minute: Option<u32>,
}

/// Resolves a presented API key to its owner.
#[async_trait]
pub trait ApiKeyLookup: Send + Sync {
    async fn lookup(&self, presented: &str) -> Option<ApiKeyRecord>;
}

/// Keys from configuration, matched by hash in constant time.
pub struct StaticKeyLookup {
    keys: Vec<ApiKeyConfig>,
}

impl StaticKeyLookup {
    pub fn new(keys: Vec<ApiKeyConfig>) -> Self {
        Self { keys }
    }
}

#[async_trait]
impl ApiKeyLookup for StaticKeyLookup {
    async fn lookup(&self, presented: &str) -> Option<ApiKeyRecord> {
        let digest = hash_text(presented);
        let mut found = None;
        // Compare against every key so timing does not reveal the position.
        for key in &self.keys {
            if bool::from(key.hash.as_bytes().ct_eq(digest.as_bytes())) {
                found = Some(ApiKeyRecord {
                    name: key.name.clone(),
                    rate_limit_per_minute: key.rate_limit_per_minute,
                });
            }
        }
        found
    }
}

/// Caches lookup outcomes, both hits and misses, for a short TTL.
pub struct CredentialValidator {
    lookup: Arc<dyn ApiKeyLookup>,
    cache: Mutex<LruCache<String, (Option<ApiKeyRecord>, Instant)>>,
    ttl: Duration,
}

impl CredentialValidator {
    pub fn new(lookup: Arc<dyn ApiKeyLookup>, capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            lookup,
            cache: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub async fn validate(&self, presented: &str) -> Option<ApiKeyRecord> {
        self.validate_at(presented, Instant::now()).await
    }

    pub async fn validate_at(&self, presented: &str, now: Instant) -> Option<ApiKeyRecord> {
        if let Some(cached) = self.cached(presented, now) {
            return cached;
        }
        let record = self.lookup.lookup(presented).await;
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(presented.to_string(), (record.clone(), now + self.ttl));
        }
        record
    }

    /// `Some(outcome)` for a live cache entry. The lock is released before
    /// returning so no guard outlives this call.
    fn cached(&self, presented: &str, now: Instant) -> Option<Option<ApiKeyRecord>> {
        let mut cache = self.cache.lock().ok()?;
        let (record, expires_at) = cache.get(presented)?;
        if *expires_at > now {
            return Some(record.clone());
        }
        cache.pop(presented);
        None
    }

    pub fn cached_len(&self) -> usize {
        self.cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }
}
