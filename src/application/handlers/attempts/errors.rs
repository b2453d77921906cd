//! Attempt handler errors.

use thiserror::Error;

use crate::domain::entitlement::{Entitlement, PayloadError};
use crate::domain::foundation::DomainError;
use crate::ports::RateLimitError;

/// Why an attempt command or query did not succeed.
///
/// `RateLimited` and `FreeLimitReached` are policy rejections, expected in
/// normal operation; the rest are failures.
#[derive(Debug, Clone, Error)]
pub enum AttemptError {
    #[error("Too many requests, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64, reset_ms: u64 },

    #[error("Free attempt limit reached")]
    FreeLimitReached { entitlement: Entitlement },

    #[error(transparent)]
    InvalidPayload(#[from] PayloadError),

    #[error("Attempt not found")]
    NotFound,

    #[error("Rate limiter failed: {0}")]
    Limiter(#[from] RateLimitError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl AttemptError {
    /// Machine-readable code surfaced to clients.
    pub fn code(&self) -> &'static str {
        match self {
            AttemptError::RateLimited { .. } => "RATE_LIMITED",
            AttemptError::FreeLimitReached { .. } => "FREE_LIMIT_REACHED",
            AttemptError::InvalidPayload(e) => e.code(),
            AttemptError::NotFound => "NOT_FOUND",
            AttemptError::Limiter(_) | AttemptError::Domain(_) => "INTERNAL_ERROR",
        }
    }

    /// Policy rejections are not failures and are never logged as errors.
    pub fn is_policy_rejection(&self) -> bool {
        matches!(
            self,
            AttemptError::RateLimited { .. } | AttemptError::FreeLimitReached { .. }
        )
    }
}
