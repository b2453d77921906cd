//! ListAttemptsHandler - Query handler for a subscriber's attempt history.

use std::sync::Arc;

use crate::domain::entitlement::{compute, AttemptRecord, Entitlement, GracePolicy};
use crate::domain::foundation::{SubscriberId, Timestamp};
use crate::ports::{AttemptStore, SubscriberRepository};

use super::AttemptError;

pub const DEFAULT_LIST_LIMIT: u32 = 50;
pub const MAX_LIST_LIMIT: u32 = 200;

/// Query for the newest non-deleted attempts.
#[derive(Debug, Clone)]
pub struct ListAttemptsQuery {
    pub subscriber_id: SubscriberId,
    pub limit: Option<u32>,
}

impl ListAttemptsQuery {
    /// Requested limit clamped to `1..=200`, default 50.
    pub fn effective_limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT)
    }
}

/// Attempts newest first, with the entitlement they leave.
#[derive(Debug, Clone)]
pub struct ListAttemptsResult {
    pub attempts: Vec<AttemptRecord>,
    pub entitlement: Entitlement,
}

/// Handler for listing attempts.
pub struct ListAttemptsHandler {
    subscribers: Arc<dyn SubscriberRepository>,
    attempts: Arc<dyn AttemptStore>,
    policy: GracePolicy,
    default_cap: u32,
}

impl ListAttemptsHandler {
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

    pub async fn handle(&self, query: ListAttemptsQuery) -> Result<ListAttemptsResult, AttemptError> {
        let id = &query.subscriber_id;
        let subscriber = self.subscribers.ensure(id, self.default_cap).await?;

        let (attempts, used) = futures::try_join!(
            self.attempts.list_active(id, query.effective_limit()),
            self.attempts.count_active(id),
        )?;

        Ok(ListAttemptsResult {
            attempts,
            entitlement: compute(&subscriber, used, Timestamp::now(), &self.policy),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryEntitlementStore;
    use crate::application::AttemptLedger;
    use crate::domain::entitlement::NewAttempt;
    use serde_json::json;

    fn user() -> SubscriberId {
        SubscriberId::new("lister").unwrap()
    }

    async fn seeded(count: usize) -> (InMemoryEntitlementStore, ListAttemptsHandler) {
        let store = InMemoryEntitlementStore::new();
        store.ensure(&user(), 10).await.unwrap();
        let ledger = AttemptLedger::new(Arc::new(store.clone()), GracePolicy::default());
        for i in 0..count {
            let attempt = NewAttempt {
                occurred_at: Timestamp::now(),
                body: json!({ "question": format!("q{}", i), "transcript": "t" }),
            };
            ledger.create(&user(), &attempt).await.unwrap();
        }
        let handler = ListAttemptsHandler::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            GracePolicy::default(),
            3,
        );
        (store, handler)
    }

    #[test]
    fn limit_is_clamped() {
        let query = |limit| ListAttemptsQuery {
            subscriber_id: user(),
            limit,
        };
        assert_eq!(query(None).effective_limit(), 50);
        assert_eq!(query(Some(0)).effective_limit(), 1);
        assert_eq!(query(Some(500)).effective_limit(), 200);
        assert_eq!(query(Some(25)).effective_limit(), 25);
    }

    #[tokio::test]
    async fn lists_with_entitlement() {
        let (_store, handler) = seeded(4).await;
        let result = handler
            .handle(ListAttemptsQuery {
                subscriber_id: user(),
                limit: Some(2),
            })
            .await
            .unwrap();

        assert_eq!(result.attempts.len(), 2);
        assert_eq!(result.entitlement.used, 4);
        assert_eq!(result.entitlement.remaining, Some(6));
    }

    #[tokio::test]
    async fn unknown_subscriber_gets_default_cap() {
        let store = InMemoryEntitlementStore::new();
        let handler = ListAttemptsHandler::new(
            Arc::new(store.clone()),
            Arc::new(store),
            GracePolicy::default(),
            3,
        );
        let result = handler
            .handle(ListAttemptsQuery {
                subscriber_id: user(),
                limit: None,
            })
            .await
            .unwrap();

        assert!(result.attempts.is_empty());
        assert_eq!(result.entitlement.cap, Some(3));
        assert!(result.entitlement.allowed);
    }
}
