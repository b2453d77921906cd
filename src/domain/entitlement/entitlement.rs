//! Entitlement calculation.
//!
//! Pure mapping from a subscriber's stored billing state plus the number of
//! non-deleted attempts to an allowed/remaining decision. No store access.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::Timestamp;

use super::{Subscriber, SubscriptionStatus};

/// How a lapsed subscription's already-paid period is honoured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GracePolicy {
    /// Treat a future `current_period_end` as Pro even when the status lapsed.
    pub honor_period_end: bool,
    /// Whether a `past_due` subscriber may be Pro through the period end alone.
    pub include_past_due: bool,
}

impl Default for GracePolicy {
    fn default() -> Self {
        Self {
            honor_period_end: true,
            include_past_due: true,
        }
    }
}

impl GracePolicy {
    /// Status-only rule, no grace window.
    pub fn strict() -> Self {
        Self {
            honor_period_end: false,
            include_past_due: false,
        }
    }

    /// Decides Pro from the raw billing fields.
    pub fn is_pro(
        &self,
        status: SubscriptionStatus,
        current_period_end: Option<Timestamp>,
        now: Timestamp,
    ) -> bool {
        if status.is_paying() {
            return true;
        }
        if !self.honor_period_end {
            return false;
        }
        if status == SubscriptionStatus::PastDue && !self.include_past_due {
            return false;
        }
        current_period_end.map_or(false, |end| end.is_after(&now))
    }

    /// Decides Pro for a stored subscriber.
    pub fn is_pro_subscriber(&self, subscriber: &Subscriber, now: Timestamp) -> bool {
        self.is_pro(
            subscriber.subscription_status,
            subscriber.current_period_end,
            now,
        )
    }
}

/// Computed decision for a subscriber's next metered action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entitlement {
    pub allowed: bool,
    pub is_pro: bool,
    /// `None` means unlimited.
    pub cap: Option<u32>,
    pub used: u32,
    /// `None` means unlimited.
    pub remaining: Option<u32>,
    /// Set when `allowed` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenialReason>,
}

/// Why an entitlement does not allow another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenialReason {
    FreeLimitReached,
}

impl Entitlement {
    /// Unlimited Pro entitlement. Usage is not tracked against a cap.
    pub fn pro() -> Self {
        Self {
            allowed: true,
            is_pro: true,
            cap: None,
            used: 0,
            remaining: None,
            reason: None,
        }
    }

    /// Free-tier entitlement for `used` attempts against `cap`.
    pub fn free(cap: u32, used: u32) -> Self {
        let remaining = cap.saturating_sub(used);
        Self {
            allowed: remaining > 0,
            is_pro: false,
            cap: Some(cap),
            used,
            remaining: Some(remaining),
            reason: (remaining == 0).then_some(DenialReason::FreeLimitReached),
        }
    }
}

/// Computes the entitlement of `subscriber` given its non-deleted attempt count.
pub fn compute(
    subscriber: &Subscriber,
    used: u32,
    now: Timestamp,
    policy: &GracePolicy,
) -> Entitlement {
    if policy.is_pro_subscriber(subscriber, now) {
        Entitlement::pro()
    } else {
        Entitlement::free(subscriber.free_attempt_cap, used)
    }
}
