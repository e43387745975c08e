use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Per-identity throttling state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    /// Requests admitted in the current window.
    pub count: u32,
    pub window_reset_at: Instant,
    /// Denials accumulated since the last block.
    pub violation_count: u32,
    pub blocked_until: Option<Instant>,
}

impl RateLimitEntry {
    pub fn fresh(now: Instant, window: Duration) -> Self {
        Self {
            count: 0,
            window_reset_at: now + window,
            violation_count: 0,
            blocked_until: None,
        }
    }

    /// Nothing left to remember once the window ran out and no block applies.
    pub fn is_idle(&self, now: Instant) -> bool {
        self.window_reset_at <= now && self.blocked_until.is_none_or(|until| until <= now)
    }
}

/// Storage for [`RateLimitEntry`] values, keyed by identity.
///
/// Mutation happens through closures so an implementation can apply each
/// update atomically for its identity.
pub trait RateLimitStore: Send + Sync {
    /// Apply `f` to the entry of `identity`, inserting `fresh` first when the
    /// identity is unknown.
    fn update(
        &self,
        identity: &str,
        fresh: RateLimitEntry,
        f: &mut dyn FnMut(&mut RateLimitEntry) -> Decision,
    ) -> Decision;

    /// Keep entries for which `keep` returns true; returns how many were dropped.
    fn retain(&self, keep: &mut dyn FnMut(&RateLimitEntry) -> bool) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local [`RateLimitStore`].
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    entries: DashMap<String, RateLimitEntry>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateLimitStore for InMemoryRateLimitStore {
    fn update(
        &self,
        identity: &str,
        fresh: RateLimitEntry,
        f: &mut dyn FnMut(&mut RateLimitEntry) -> Decision,
    ) -> Decision {
        let mut entry = self.entries.entry(identity.to_string()).or_insert(fresh);
        f(entry.value_mut())
    }

    fn retain(&self, keep: &mut dyn FnMut(&RateLimitEntry) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| keep(entry));
        before.saturating_sub(self.entries.len())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Outcome of a quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed {
        limit: u32,
        remaining: u32,
        reset_after: Duration,
    },
    /// Over quota for the current window.
    Denied { limit: u32, retry_after: Duration },
    /// Serving a cooldown after too many denials.
    Blocked { limit: u32, retry_after: Duration },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }
}

/// Fixed-quota window limiter with escalation to a temporary block.
///
/// Each identity may make `limit` requests per window. A request over quota
/// is denied and counts as a violation; reaching `violation_threshold`
/// violations blocks the identity for `block` regardless of its quota.
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    window: Duration,
    violation_threshold: u32,
    block: Duration,
}

impl RateLimiter {
    pub fn new(
        store: Arc<dyn RateLimitStore>,
        window: Duration,
        violation_threshold: u32,
        block: Duration,
    ) -> Self {
        Self {
            store,
            window,
            violation_threshold: violation_threshold.max(1),
            block,
        }
    }

    /// Count one request from `identity` against `limit` at time `now`.
    pub fn check_at(&self, identity: &str, limit: u32, now: Instant) -> Decision {
        let window = self.window;
        let threshold = self.violation_threshold;
        let block = self.block;

        self.store.update(
            identity,
            RateLimitEntry::fresh(now, window),
            &mut |entry: &mut RateLimitEntry| {
                if let Some(until) = entry.blocked_until {
                    if now < until {
                        return Decision::Blocked {
                            limit,
                            retry_after: until - now,
                        };
                    }
                    *entry = RateLimitEntry::fresh(now, window);
                }

                if entry.window_reset_at <= now {
                    entry.count = 0;
                    entry.window_reset_at = now + window;
                }

                if entry.count >= limit {
                    entry.violation_count += 1;
                    if entry.violation_count >= threshold {
                        entry.blocked_until = Some(now + block);
                        return Decision::Blocked {
                            limit,
                            retry_after: block,
                        };
                    }
                    return Decision::Denied {
                        limit,
                        retry_after: entry.window_reset_at - now,
                    };
                }

                entry.count += 1;
                Decision::Allowed {
                    limit,
                    remaining: limit - entry.count,
                    reset_after: entry.window_reset_at - now,
                }
            },
        )
    }

    /// Drop idle entries; returns how many were removed.
    pub fn sweep(&self, now: Instant) -> usize {
        self.store
            .retain(&mut |entry: &RateLimitEntry| !entry.is_idle(now))
    }

    pub fn tracked(&self) -> usize {
        self.store.len()
    }
}
