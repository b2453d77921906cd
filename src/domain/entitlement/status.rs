//! Subscription status as last reported by the payment provider.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stored subscription status of a subscriber.
///
/// Only the reconciler writes this value. Provider statuses that have no
/// meaning here (`incomplete`, `paused`, ...) collapse into `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Never subscribed.
    #[default]
    None,
    Active,
    Trialing,
    /// Latest invoice failed; provider is retrying payment.
    PastDue,
    Canceled,
    Unpaid,
    Unknown,
}

impl SubscriptionStatus {
    /// Statuses that grant Pro regardless of the paid period.
    pub fn is_paying(&self) -> bool {
        matches!(self, SubscriptionStatus::Active | SubscriptionStatus::Trialing)
    }

    /// Canonical storage string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::None => "none",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Unpaid => "unpaid",
            SubscriptionStatus::Unknown => "unknown",
        }
    }

    /// Parses a stored or provider-reported status string.
    ///
    /// Never fails: anything unrecognised becomes `Unknown`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "none" => SubscriptionStatus::None,
            "active" => SubscriptionStatus::Active,
            "trialing" => SubscriptionStatus::Trialing,
            "past_due" => SubscriptionStatus::PastDue,
            "canceled" | "cancelled" => SubscriptionStatus::Canceled,
            "unpaid" => SubscriptionStatus::Unpaid,
            _ => SubscriptionStatus::Unknown,
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
