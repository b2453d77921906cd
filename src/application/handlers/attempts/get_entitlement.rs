//! GetEntitlementHandler - Query handler for the current entitlement.

use std::sync::Arc;

use crate::domain::entitlement::{compute, Entitlement, GracePolicy};
use crate::domain::foundation::{SubscriberId, Timestamp};
use crate::ports::{AttemptStore, SubscriberRepository};

use super::AttemptError;

/// Query for one subscriber's entitlement.
#[derive(Debug, Clone)]
pub struct GetEntitlementQuery {
    pub subscriber_id: SubscriberId,
}

/// Handler for entitlement reads. Never writes attempts.
pub struct GetEntitlementHandler {
    subscribers: Arc<dyn SubscriberRepository>,
    attempts: Arc<dyn AttemptStore>,
    policy: GracePolicy,
    default_cap: u32,
}

impl GetEntitlementHandler {
    pub fn new(
        subscribers: Arc<dyn SubscriberRepository>,
        attempts: Arc<dyn AttemptStore>,
        policy: GracePolicy,
        default_cap: u32,
    ) -> Self {
        Self {
            subscribers,
            attempts,
            policy,
            default_cap,
        }
    }

    pub async fn handle(&self, query: GetEntitlementQuery) -> Result<Entitlement, AttemptError> {
        let subscriber = self
            .subscribers
            .ensure(&query.subscriber_id, self.default_cap)
            .await?;
        let used = self.attempts.count_active(&query.subscriber_id).await?;
        Ok(compute(&subscriber, used, Timestamp::now(), &self.policy))
    }
}
