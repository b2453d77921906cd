//! Shared-store limiter with a local fallback.
//!
//! When Redis cannot be reached the check is answered by a process-local
//! counter with the same window semantics. This weakens the guarantee from
//! "global across instances" to "per process"; every fallback is logged so
//! the degradation is visible.

use async_trait::async_trait;
use std::sync::Arc;

use crate::ports::{RateLimitDecision, RateLimitError, RateLimitKey, RateLimiter, WindowLimit};

use super::InMemoryRateLimiter;

/// Wraps a shared limiter and degrades to local counting on `Unavailable`.
pub struct FallbackRateLimiter {
    primary: Arc<dyn RateLimiter>,
    local: InMemoryRateLimiter,
}

impl FallbackRateLimiter {
    pub fn new(primary: Arc<dyn RateLimiter>) -> Self {
        Self {
            primary,
            local: InMemoryRateLimiter::new(),
        }
    }
}

#[async_trait]
impl RateLimiter for FallbackRateLimiter {
    async fn check(
        &self,
        key: &RateLimitKey,
        limit: WindowLimit,
    ) -> Result<RateLimitDecision, RateLimitError> {
        match self.primary.check(key, limit).await {
            Ok(decision) => Ok(decision),
            Err(RateLimitError::Unavailable(reason)) => {
                tracing::warn!(
                    action = %key.action,
                    scope = %key.scope,
                    error = %reason,
                    "shared rate limit store unavailable, counting per process"
                );
                self.local.check(key, limit).await
            }
            Err(other) => Err(other),
        }
    }

    async fn reset(&self, key: &RateLimitKey) -> Result<(), RateLimitError> {
        self.local.reset(key).await?;
        self.primary.reset(key).await
    }
}

impl std::fmt::Debug for FallbackRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackRateLimiter")
            .field("local", &self.local)
            .finish_non_exhaustive()
    }
}
