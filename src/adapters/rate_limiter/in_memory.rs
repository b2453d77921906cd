//! In-memory rate limiter implementation.
//!
//! Fixed-window counters in a process-local HashMap. Limits are enforced per
//! process only; with several instances each keeps its own counts.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::ports::{RateLimitDecision, RateLimitError, RateLimitKey, RateLimiter, WindowLimit};

/// Entries above this count trigger a sweep of expired windows.
const SWEEP_THRESHOLD: usize = 10_000;

/// In-memory rate limiter for tests, single-instance deployments and as the
/// local fallback when Redis is unreachable.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRateLimiter {
    /// Per-key window state.
    windows: Arc<RwLock<HashMap<String, WindowState>>>,
}

/// State for a single rate limit window.
#[derive(Debug, Clone)]
struct WindowState {
    /// Hits counted in the current window, denied ones included.
    count: u64,
    /// When the current window ends.
    expires_at: Instant,
}

impl InMemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live and expired windows currently held.
    pub async fn tracked_keys(&self) -> usize {
        self.windows.read().await.len()
    }

    /// Drops windows that have already expired.
    pub async fn purge_expired(&self) {
        let now = Instant::now();
        self.windows
            .write()
            .await
            .retain(|_, state| state.expires_at > now);
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(
        &self,
        key: &RateLimitKey,
        limit: WindowLimit,
    ) -> Result<RateLimitDecision, RateLimitError> {
        let storage_key = key.to_redis_key();
        let now = Instant::now();
        let window = Duration::from_millis(limit.window_ms);

        let mut windows = self.windows.write().await;

        if windows.len() > SWEEP_THRESHOLD {
            windows.retain(|_, state| state.expires_at > now);
        }

        let state = windows.entry(storage_key).or_insert_with(|| WindowState {
            count: 0,
            expires_at: now + window,
        });

        // Expired window starts over with this hit
        if now >= state.expires_at {
            state.count = 0;
            state.expires_at = now + window;
        }

        state.count += 1;
        let reset_ms = state.expires_at.saturating_duration_since(now).as_millis() as u64;

        Ok(RateLimitDecision::from_count(limit, state.count, reset_ms))
    }

    async fn reset(&self, key: &RateLimitKey) -> Result<(), RateLimitError> {
        self.windows.write().await.remove(&key.to_redis_key());
        Ok(())
    }
}
