//! Redis-backed rate limiter implementation for production deployments.
//!
//! Uses a fixed-window counter algorithm with Redis INCR + PEXPIRE.
//! Suitable for multi-server deployments.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::ports::{RateLimitDecision, RateLimitError, RateLimitKey, RateLimiter, WindowLimit};

/// Redis-backed rate limiter shared by every service instance.
///
/// Uses a fixed-window counter algorithm:
/// 1. INCR the key to increment the counter
/// 2. If count is 1, set PEXPIRE for the window duration
/// 3. If count > limit, deny the request
///
/// Requests can briefly exceed limits around window boundaries. That is
/// inherent to fixed windows and accepted here.
#[derive(Clone)]
pub struct RedisRateLimiter {
    conn: MultiplexedConnection,
}

impl RedisRateLimiter {
    /// Create a new Redis rate limiter.
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }

    /// Opens a multiplexed connection to `url`.
    pub async fn connect(url: &str) -> Result<Self, RateLimitError> {
        let client = redis::Client::open(url).map_err(unavailable)?;
        let conn = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(unavailable)?;
        Ok(Self::new(conn))
    }
}

fn unavailable(e: redis::RedisError) -> RateLimitError {
    RateLimitError::Unavailable(e.to_string())
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn check(
        &self,
        key: &RateLimitKey,
        limit: WindowLimit,
    ) -> Result<RateLimitDecision, RateLimitError> {
        let redis_key = key.to_redis_key();
        let window_ms = limit.window_ms.max(1) as i64;

        let mut conn = self.conn.clone();

        // Atomic increment
        let count: i64 = conn.incr(&redis_key, 1_i64).await.map_err(unavailable)?;

        // Get TTL for reset time
        let mut ttl_ms: i64 = conn.pttl(&redis_key).await.map_err(unavailable)?;

        // Start the window on the first hit, or repair a key that lost its expiry
        if count == 1 || ttl_ms < 0 {
            conn.pexpire::<_, ()>(&redis_key, window_ms)
                .await
                .map_err(unavailable)?;
            ttl_ms = window_ms;
        }

        Ok(RateLimitDecision::from_count(
            limit,
            count.max(0) as u64,
            ttl_ms as u64,
        ))
    }

    async fn reset(&self, key: &RateLimitKey) -> Result<(), RateLimitError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key.to_redis_key())
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}

impl std::fmt::Debug for RedisRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisRateLimiter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Needs a running Redis; run with `cargo test -- --ignored`.
    #[tokio::test]
    #[ignore]
    async fn counts_against_live_redis() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".into());
        let limiter = RedisRateLimiter::connect(&url).await.unwrap();
        let key = RateLimitKey::user("redis_smoke", &uuid::Uuid::new_v4().to_string());
        let limit = WindowLimit::new(2, 60_000);

        assert_eq!(limiter.check(&key, limit).await.unwrap().remaining, 1);
        assert_eq!(limiter.check(&key, limit).await.unwrap().remaining, 0);
        let denied = limiter.check(&key, limit).await.unwrap();
        assert!(!denied.allowed);
        assert!(denied.reset_ms <= 60_000);

        limiter.reset(&key).await.unwrap();
    }
}
