//! Rate limiting port for protecting metered actions.
//!
//! Fixed-window counters keyed by action and identity. Implementations
//! exist for a shared Redis store and for local process memory; which one a
//! deployment uses is decided when the service is wired, not per call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Port for rate limiting operations.
///
/// Implementations must be safe under concurrent access: the increment of a
/// window counter is atomic.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Counts one hit against `key` in its current window.
    ///
    /// The first hit of a window starts the window; hits beyond
    /// `limit.max_requests` are denied until it expires.
    async fn check(
        &self,
        key: &RateLimitKey,
        limit: WindowLimit,
    ) -> Result<RateLimitDecision, RateLimitError>;

    /// Clears the current window for a key (admin and test operation).
    async fn reset(&self, key: &RateLimitKey) -> Result<(), RateLimitError>;
}

/// Key identifying what to rate limit.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct RateLimitKey {
    /// Metered action, e.g. `attempt_create`.
    pub action: String,
    /// Kind of identity the counter belongs to.
    pub scope: RateLimitScope,
    /// Subscriber id or client IP.
    pub identifier: String,
}

/// The identity a counter is kept for.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitScope {
    /// Per-authenticated-subscriber counter.
    User,
    /// Per-network-origin counter.
    Ip,
}

impl RateLimitKey {
    /// Creates a subscriber-scoped key.
    pub fn user(action: &str, subscriber_id: &str) -> Self {
        Self {
            action: action.to_string(),
            scope: RateLimitScope::User,
            identifier: subscriber_id.to_string(),
        }
    }

    /// Creates an IP-scoped key.
    pub fn ip(action: &str, ip: &str) -> Self {
        Self {
            action: action.to_string(),
            scope: RateLimitScope::Ip,
            identifier: ip.to_string(),
        }
    }

    /// Returns the Redis key string for this rate limit key.
    pub fn to_redis_key(&self) -> String {
        format!(
            "ratelimit:{}:{}:{}",
            self.action,
            self.scope.as_str(),
            self.identifier
        )
    }
}

impl RateLimitScope {
    /// Returns the string representation of the scope.
    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitScope::User => "user",
            RateLimitScope::Ip => "ip",
        }
    }
}

impl fmt::Display for RateLimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Size of a fixed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowLimit {
    pub max_requests: u32,
    pub window_ms: u64,
}

impl WindowLimit {
    pub fn new(max_requests: u32, window_ms: u64) -> Self {
        Self {
            max_requests,
            window_ms,
        }
    }

    /// Convenience constructor for whole-second windows.
    pub fn per_secs(max_requests: u32, window_secs: u64) -> Self {
        Self::new(max_requests, window_secs.saturating_mul(1000))
    }
}

/// Outcome of counting one hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Milliseconds until the current window ends.
    pub reset_ms: u64,
}

impl RateLimitDecision {
    /// Builds the decision for the `count`-th hit of a window.
    pub fn from_count(limit: WindowLimit, count: u64, reset_ms: u64) -> Self {
        if count > u64::from(limit.max_requests) {
            Self {
                allowed: false,
                limit: limit.max_requests,
                remaining: 0,
                reset_ms,
            }
        } else {
            Self {
                allowed: true,
                limit: limit.max_requests,
                remaining: limit.max_requests - count as u32,
                reset_ms,
            }
        }
    }

    /// Caller-facing retry hint, rounded up to whole seconds.
    pub fn retry_after_secs(&self) -> u64 {
        ((self.reset_ms + 999) / 1000).max(1)
    }

    /// Combines two independent limiter decisions for the same action.
    ///
    /// Denied if either denies. The retry hint is the later of the two
    /// windows so the caller does not come back while one is still closed.
    pub fn combine(self, other: RateLimitDecision) -> RateLimitDecision {
        RateLimitDecision {
            allowed: self.allowed && other.allowed,
            limit: self.limit.min(other.limit),
            remaining: self.remaining.min(other.remaining),
            reset_ms: self.reset_ms.max(other.reset_ms),
        }
    }
}

/// Errors from rate limiting operations.
#[derive(Debug, Clone, Error)]
pub enum RateLimitError {
    /// Counter store is unreachable.
    #[error("Rate limiter unavailable: {0}")]
    Unavailable(String),

    /// Invalid rate limit key.
    #[error("Invalid rate limit key: {0}")]
    InvalidKey(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_key_formats_redis_key() {
        let key = RateLimitKey::user("attempt_create", "user-123");
        assert_eq!(key.scope, RateLimitScope::User);
        assert_eq!(key.to_redis_key(), "ratelimit:attempt_create:user:user-123");
    }

    #[test]
    fn ip_key_formats_redis_key() {
        let key = RateLimitKey::ip("attempt_create", "192.168.1.1");
        assert_eq!(key.to_redis_key(), "ratelimit:attempt_create:ip:192.168.1.1");
    }

    #[test]
    fn decision_counts_down_then_denies() {
        let limit = WindowLimit::per_secs(5, 60);
        assert_eq!(RateLimitDecision::from_count(limit, 1, 60_000).remaining, 4);
        let fifth = RateLimitDecision::from_count(limit, 5, 1_000);
        assert!(fifth.allowed);
        assert_eq!(fifth.remaining, 0);
        let sixth = RateLimitDecision::from_count(limit, 6, 1_000);
        assert!(!sixth.allowed);
        assert_eq!(sixth.remaining, 0);
    }

    #[test]
    fn retry_after_rounds_up() {
        let d = RateLimitDecision::from_count(WindowLimit::per_secs(1, 60), 2, 1_001);
        assert_eq!(d.retry_after_secs(), 2);
        let d = RateLimitDecision::from_count(WindowLimit::per_secs(1, 60), 2, 0);
        assert_eq!(d.retry_after_secs(), 1);
    }

    #[test]
    fn combine_denies_if_either_denies_and_keeps_larger_reset() {
        let user = RateLimitDecision {
            allowed: true,
            limit: 10,
            remaining: 7,
            reset_ms: 5_000,
        };
        let ip = RateLimitDecision {
            allowed: false,
            limit: 20,
            remaining: 0,
            reset_ms: 42_000,
        };
        let combined = user.combine(ip);
        assert!(!combined.allowed);
        assert_eq!(combined.remaining, 0);
        assert_eq!(combined.reset_ms, 42_000);
        assert_eq!(ip.combine(user), combined);
    }
}
