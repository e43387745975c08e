//! Admission control: per-identity quotas in front of every resolution route.
//!
//! Callers presenting an API key are throttled per key with the authenticated
//! quota (or the key's own override); everyone else is throttled per client
//! IP with the anonymous quota. State lives in an injected
//! [`RateLimitStore`] and is evicted by [`AdmissionControl::sweep`].

mod credentials;
mod limiter;

pub use credentials::{ApiKeyConfig, ApiKeyLookup, ApiKeyRecord, CredentialValidator, StaticKeyLookup};
pub use limiter::{Decision, InMemoryRateLimitStore, RateLimitEntry, RateLimitStore, RateLimiter};

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::ServerError;

/// Admission settings. Every field has a serde default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdmissionConfig {
    #[serde(default = "default_anonymous_per_minute")]
    pub anonymous_per_minute: u32,
    #[serde(default = "default_authenticated_per_minute")]
    pub authenticated_per_minute: u32,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Denials tolerated before an identity is blocked.
    #[serde(default = "default_violation_threshold")]
    pub violation_threshold: u32,
    #[serde(default = "default_block_secs")]
    pub block_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_credential_cache_ttl_secs")]
    pub credential_cache_ttl_secs: u64,
    #[serde(default = "default_credential_cache_capacity")]
    pub credential_cache_capacity: usize,
    /// Refuse callers without an API key instead of applying the anonymous quota.
    #[serde(default)]
    pub require_api_key: bool,
    #[serde(default)]
    pub api_keys: Vec<ApiKeyConfig>,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            anonymous_per_minute: default_anonymous_per_minute(),
            authenticated_per_minute: default_authenticated_per_minute(),
            window_secs: default_window_secs(),
            violation_threshold: default_violation_threshold(),
            block_secs: default_block_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            credential_cache_ttl_secs: default_credential_cache_ttl_secs(),
            credential_cache_capacity: default_credential_cache_capacity(),
            require_api_key: false,
            api_keys: Vec::new(),
        }
    }
}

impl AdmissionConfig {
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.window_secs == 0 {
            return Err(ServerError::Config("admission.window_secs must be >= 1".into()));
        }
        for key in &self.api_keys {
            key.validate()?;
        }
        Ok(())
    }
}

fn default_anonymous_per_minute() -> u32 {
    60
}

fn default_authenticated_per_minute() -> u32 {
    600
}

fn default_window_secs() -> u64 {
    60
}

fn default_violation_threshold() -> u32 {
    5
}

fn default_block_secs() -> u64 {
    15 * 60
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_credential_cache_ttl_secs() -> u64 {
    300
}

fn default_credential_cache_capacity() -> usize {
    1024
}

/// Who a request is throttled as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    ApiKey(ApiKeyRecord),
    Ip(String),
}

impl Identity {
    /// Key under which the identity's quota state is stored.
    pub fn storage_key(&self) -> String {
        match self {
            Identity::ApiKey(record) => format!("key:{}", record.name),
            Identity::Ip(addr) => format!("ip:{addr}"),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::ApiKey(_))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}

/// Credentials and origin extracted from a request.
#[derive(Debug, Clone, Default)]
pub struct Caller<'a> {
    pub api_key: Option<&'a str>,
    pub client_ip: Option<String>,
}

/// An admitted or refused request with the quota state to report.
#[derive(Debug, Clone, PartialEq)]
pub struct Admission {
    pub identity: Identity,
    pub decision: Decision,
}

/// Gate combining credential validation with per-identity quotas.
pub struct AdmissionControl {
    cfg: AdmissionConfig,
    limiter: RateLimiter,
    credentials: CredentialValidator,
}

impl AdmissionControl {
    pub fn new(
        cfg: AdmissionConfig,
        store: Arc<dyn RateLimitStore>,
        lookup: Arc<dyn ApiKeyLookup>,
    ) -> Result<Self, ServerError> {
        cfg.validate()?;
        let limiter = RateLimiter::new(
            store,
            Duration::from_secs(cfg.window_secs),
            cfg.violation_threshold,
            Duration::from_secs(cfg.block_secs),
        );
        let credentials = CredentialValidator::new(
            lookup,
            cfg.credential_cache_capacity,
            Duration::from_secs(cfg.credential_cache_ttl_secs),
        );
        Ok(Self {
            cfg,
            limiter,
            credentials,
        })
    }

    /// In-memory state and the configured static keys.
    pub fn from_config(cfg: AdmissionConfig) -> Result<Self, ServerError> {
        let lookup = Arc::new(StaticKeyLookup::new(cfg.api_keys.clone()));
        Self::new(cfg, Arc::new(InMemoryRateLimitStore::new()), lookup)
    }

    pub fn config(&self) -> &AdmissionConfig {
        &self.cfg
    }

    pub async fn admit(&self, caller: Caller<'_>) -> Result<Admission, ServerError> {
        self.admit_at(caller, Instant::now()).await
    }

    /// Identify the caller and charge one request to it.
    ///
    /// Fails only for a bad or missing credential; quota refusals come back
    /// as a [`Decision`] so the caller can still report quota headers.
    pub async fn admit_at(&self, caller: Caller<'_>, now: Instant) -> Result<Admission, ServerError> {
        let identity = match caller.api_key {
            Some(presented) => match self.credentials.validate_at(presented, now).await {
                Some(record) => Identity::ApiKey(record),
                None => return self.reject_bad_key(caller.client_ip, now),
            },
            None if self.cfg.require_api_key => {
                return Err(ServerError::Authentication(
                    "API key required. Provide it in 'X-API-Key' or 'Authorization: Bearer <key>' header"
                        .to_string(),
                ))
            }
            None => Identity::Ip(caller.client_ip.unwrap_or_else(|| "unknown".to_string())),
        };

        let limit = self.quota_for(&identity);
        let decision = self.limiter.check_at(&identity.storage_key(), limit, now);
        Ok(Admission { identity, decision })
    }

    /// A failed credential check is charged to the caller's IP under the
    /// anonymous quota, so repeated guesses escalate to a block.
    fn reject_bad_key(
        &self,
        client_ip: Option<String>,
        now: Instant,
    ) -> Result<Admission, ServerError> {
        let identity = Identity::Ip(client_ip.unwrap_or_else(|| "unknown".to_string()));
        let decision =
            self.limiter
                .check_at(&identity.storage_key(), self.cfg.anonymous_per_minute, now);
        if decision.is_allowed() {
            return Err(ServerError::Authentication("Invalid API key".to_string()));
        }
        tracing::warn!(identity = %identity, "invalid API key attempts throttled");
        Ok(Admission { identity, decision })
    }

    fn quota_for(&self, identity: &Identity) -> u32 {
        match identity {
            Identity::ApiKey(record) => record
                .rate_limit_per_minute
                .unwrap_or(self.cfg.authenticated_per_minute),
            Identity::Ip(_) => self.cfg.anonymous_per_minute,
        }
    }

    /// Evict idle quota state; returns the number of entries removed.
    pub fn sweep(&self, now: Instant) -> usize {
        self.limiter.sweep(now)
    }

    pub fn tracked_identities(&self) -> usize {
        self.limiter.tracked()
    }
}
