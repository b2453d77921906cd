//! Subscription state reconciler.
//!
//! The single write path for billing fields. Webhooks, return-URL sync and
//! fallback sync all end here with a lookup and a set of facts, so whichever
//! call carries the freshest provider data is the one that sticks.

use std::sync::Arc;
use tracing::debug;

use crate::domain::billing::{SubscriberLookup, SubscriptionFacts};
use crate::domain::entitlement::Subscriber;
use crate::domain::foundation::{DomainError, ErrorCode, SubscriberId};
use crate::ports::SubscriberRepository;

/// Resolves subscribers and applies provider facts to them.
#[derive(Clone)]
pub struct Reconciler {
    subscribers: Arc<dyn SubscriberRepository>,
    default_cap: u32,
}

impl Reconciler {
    pub fn new(subscribers: Arc<dyn SubscriberRepository>, default_cap: u32) -> Self {
        Self {
            subscribers,
            default_cap,
        }
    }

    /// Finds the stored subscriber a lookup refers to.
    ///
    /// Tries the subscriber id, then the subscription ref, then the customer
    /// ref. An id that names no stored row falls through to the refs.
    pub async fn resolve(
        &self,
        lookup: &SubscriberLookup,
    ) -> Result<Option<Subscriber>, DomainError> {
        if let Some(id) = &lookup.subscriber_id {
            if let Some(found) = self.subscribers.find(id).await? {
                return Ok(Some(found));
            }
        }
        if let Some(subscription_ref) = &lookup.subscription_ref {
            if let Some(found) = self
                .subscribers
                .find_by_subscription_ref(subscription_ref)
                .await?
            {
                return Ok(Some(found));
            }
        }
        if let Some(customer_ref) = &lookup.customer_ref {
            return self.subscribers.find_by_customer_ref(customer_ref).await;
        }
        Ok(None)
    }

    /// Applies `facts` to whichever subscriber `lookup` resolves to.
    ///
    /// `Ok(None)` means no subscriber matched; nothing was written.
    pub async fn apply(
        &self,
        lookup: &SubscriberLookup,
        facts: &SubscriptionFacts,
    ) -> Result<Option<Subscriber>, DomainError> {
        match self.resolve(lookup).await? {
            Some(subscriber) => self.subscribers.apply_facts(&subscriber.id, facts).await,
            None => {
                debug!(?lookup, "No subscriber matched provider facts");
                Ok(None)
            }
        }
    }

    /// Applies `facts` to a known subscriber, creating the row if needed.
    pub async fn apply_for(
        &self,
        id: &SubscriberId,
        facts: &SubscriptionFacts,
    ) -> Result<Subscriber, DomainError> {
        self.subscribers.ensure(id, self.default_cap).await?;
        self.subscribers.apply_facts(id, facts).await?.ok_or_else(|| {
            DomainError::new(
                ErrorCode::SubscriberNotFound,
                format!("Subscriber {} vanished during update", id),
            )
        })
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("default_cap", &self.default_cap)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryEntitlementStore;
    use crate::domain::entitlement::SubscriptionStatus;
    use crate::domain::foundation::Timestamp;

    fn sid(s: &str) -> SubscriberId {
        SubscriberId::new(s).unwrap()
    }

    async fn store_with_refs() -> InMemoryEntitlementStore {
        let store = InMemoryEntitlementStore::new();
        let mut a = Subscriber::new(sid("alice"), 3);
        a.payment_customer_ref = Some("cus_a".into());
        a.payment_subscription_ref = Some("sub_a".into());
        store.insert_subscriber(a).await;
        let mut b = Subscriber::new(sid("bob"), 3);
        b.payment_customer_ref = Some("cus_b".into());
        store.insert_subscriber(b).await;
        store
    }

    #[tokio::test]
    async fn resolves_in_priority_order() {
        let reconciler = Reconciler::new(Arc::new(store_with_refs().await), 3);

        let by_id = SubscriberLookup {
            subscriber_id: Some(sid("bob")),
            subscription_ref: Some("sub_a".into()),
            customer_ref: None,
        };
        assert_eq!(reconciler.resolve(&by_id).await.unwrap().unwrap().id, sid("bob"));

        let unknown_id_falls_through = SubscriberLookup {
            subscriber_id: Some(sid("ghost")),
            subscription_ref: Some("sub_a".into()),
            customer_ref: Some("cus_b".into()),
        };
        assert_eq!(
            reconciler.resolve(&unknown_id_falls_through).await.unwrap().unwrap().id,
            sid("alice")
        );

        let by_customer = SubscriberLookup {
            customer_ref: Some("cus_b".into()),
            ..Default::default()
        };
        assert_eq!(reconciler.resolve(&by_customer).await.unwrap().unwrap().id, sid("bob"));

        assert!(reconciler.resolve(&SubscriberLookup::default()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn apply_is_idempotent() {
        let store = store_with_refs().await;
        let reconciler = Reconciler::new(Arc::new(store.clone()), 3);
        let lookup = SubscriberLookup {
            subscription_ref: Some("sub_a".into()),
            ..Default::default()
        };
        let facts = SubscriptionFacts {
            status: Some(SubscriptionStatus::Active),
            current_period_end: Some(Timestamp::now().add_days(30)),
            ..Default::default()
        };

        let first = reconciler.apply(&lookup, &facts).await.unwrap().unwrap();
        let second = reconciler.apply(&lookup, &facts).await.unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(second.subscription_status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn unmatched_lookup_writes_nothing() {
        let reconciler = Reconciler::new(Arc::new(store_with_refs().await), 3);
        let lookup = SubscriberLookup {
            customer_ref: Some("cus_unknown".into()),
            ..Default::default()
        };
        let result = reconciler
            .apply(&lookup, &SubscriptionFacts::with_status(SubscriptionStatus::Active))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn apply_for_creates_missing_row() {
        let store = InMemoryEntitlementStore::new();
        let reconciler = Reconciler::new(Arc::new(store.clone()), 5);

        let subscriber = reconciler
            .apply_for(&sid("new"), &SubscriptionFacts::with_status(SubscriptionStatus::Trialing))
            .await
            .unwrap();
        assert_eq!(subscriber.free_attempt_cap, 5);
        assert_eq!(subscriber.subscription_status, SubscriptionStatus::Trialing);
    }
}
