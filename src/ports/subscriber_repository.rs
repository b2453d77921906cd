//! SubscriberRepository port - persistence of subscriber billing state.
//!
//! Subscribers are created lazily on first contact and never deleted.
//! Billing fields change only through [`SubscriberRepository::apply_facts`].

use async_trait::async_trait;

use crate::domain::billing::SubscriptionFacts;
use crate::domain::entitlement::Subscriber;
use crate::domain::foundation::{DomainError, SubscriberId};

#[async_trait]
pub trait SubscriberRepository: Send + Sync {
    /// Returns the subscriber, inserting it with `default_cap` if absent.
    async fn ensure(
        &self,
        id: &SubscriberId,
        default_cap: u32,
    ) -> Result<Subscriber, DomainError>;

    async fn find(&self, id: &SubscriberId) -> Result<Option<Subscriber>, DomainError>;

    async fn find_by_subscription_ref(
        &self,
        subscription_ref: &str,
    ) -> Result<Option<Subscriber>, DomainError>;

    async fn find_by_customer_ref(
        &self,
        customer_ref: &str,
    ) -> Result<Option<Subscriber>, DomainError>;

    /// Writes the provided fields of `facts` onto the subscriber.
    ///
    /// Returns the updated record, or `None` if the subscriber does not exist.
    /// Must be idempotent: reapplying identical facts is a no-op.
    async fn apply_facts(
        &self,
        id: &SubscriberId,
        facts: &SubscriptionFacts,
    ) -> Result<Option<Subscriber>, DomainError>;
}
