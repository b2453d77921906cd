//! Subscriber record as seen by the entitlement rules.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{SubscriberId, Timestamp};

use super::SubscriptionStatus;

/// Free attempts granted to a subscriber without a paid plan.
pub const DEFAULT_FREE_ATTEMPT_CAP: u32 = 3;

/// One subscriber account and its billing-derived state.
///
/// `subscription_status` and `current_period_end` are written by the
/// reconciler only. The attempt ledger reads them under lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: SubscriberId,
    pub subscription_status: SubscriptionStatus,
    pub free_attempt_cap: u32,
    /// End of already-paid time, independent of status.
    pub current_period_end: Option<Timestamp>,
    pub payment_customer_ref: Option<String>,
    pub payment_subscription_ref: Option<String>,
    pub payment_price_ref: Option<String>,
}

impl Subscriber {
    /// A subscriber that has never interacted with billing.
    pub fn new(id: SubscriberId, free_attempt_cap: u32) -> Self {
        Self {
            id,
            subscription_status: SubscriptionStatus::None,
            free_attempt_cap,
            current_period_end: None,
            payment_customer_ref: None,
            payment_subscription_ref: None,
            payment_price_ref: None,
        }
    }
}
