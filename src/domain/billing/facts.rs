//! Provider-reported facts and their application to a subscriber.
//!
//! Webhook, return-URL sync and fallback sync all reduce what they learn from
//! the provider to a [`SubscriptionFacts`] value and hand it to the same
//! apply routine, so the three paths converge by construction.

use serde::Serialize;

use crate::domain::entitlement::{Subscriber, SubscriptionStatus};
use crate::domain::foundation::{SubscriberId, Timestamp};

/// Provider-neutral snapshot of a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSubscription {
    pub id: String,
    pub customer_ref: Option<String>,
    pub status: SubscriptionStatus,
    pub price_ref: Option<String>,
    pub current_period_end: Option<Timestamp>,
    /// Subscriber id stamped into the subscription metadata at checkout.
    pub subscriber_hint: Option<String>,
}

/// Provider-neutral snapshot of an invoice as retrieved from the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInvoice {
    pub id: String,
    pub customer_ref: Option<String>,
    pub subscription_ref: Option<String>,
    /// End of the first line carrying a period. Proration and tax lines
    /// often come first and have none.
    pub period_end: Option<Timestamp>,
    /// Price of that same line.
    pub price_ref: Option<String>,
}

impl ProviderInvoice {
    /// Refs from the retrieved invoice replace the event's copy.
    pub fn refine_lookup(&self, lookup: &mut SubscriberLookup) {
        if self.customer_ref.is_some() {
            lookup.customer_ref = self.customer_ref.clone();
        }
        if self.subscription_ref.is_some() {
            lookup.subscription_ref = self.subscription_ref.clone();
        }
    }

    /// Settled-invoice facts; the retrieved lines win over the event's.
    pub fn refine_paid_facts(&self, facts: &mut SubscriptionFacts) {
        if self.customer_ref.is_some() {
            facts.customer_ref = self.customer_ref.clone();
        }
        if self.subscription_ref.is_some() {
            facts.subscription_ref = self.subscription_ref.clone();
        }
        if self.period_end.is_some() {
            facts.current_period_end = self.period_end;
            if self.price_ref.is_some() {
                facts.price_ref = self.price_ref.clone();
            }
        }
    }
}

/// Hosted checkout mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutMode {
    Subscription,
    Payment,
}

impl CheckoutMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutMode::Subscription => "subscription",
            CheckoutMode::Payment => "payment",
        }
    }

    /// Unknown or missing modes are treated as one-time payments.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("subscription") => CheckoutMode::Subscription,
            _ => CheckoutMode::Payment,
        }
    }
}

/// Provider-neutral snapshot of a completed hosted checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionSnapshot {
    pub id: String,
    pub mode: CheckoutMode,
    pub paid: bool,
    /// Subscriber reference embedded when the session was created.
    pub subscriber_ref: Option<String>,
    pub customer_ref: Option<String>,
    pub subscription_ref: Option<String>,
    /// Present when the provider expanded the subscription.
    pub subscription: Option<ProviderSubscription>,
}

/// How to find the subscriber an event is about. Tried in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriberLookup {
    pub subscriber_id: Option<SubscriberId>,
    pub subscription_ref: Option<String>,
    pub customer_ref: Option<String>,
}

impl SubscriberLookup {
    pub fn is_empty(&self) -> bool {
        self.subscriber_id.is_none()
            && self.subscription_ref.is_none()
            && self.customer_ref.is_none()
    }
}

/// Billing fields learned from the provider. `None` leaves the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionFacts {
    pub status: Option<SubscriptionStatus>,
    pub current_period_end: Option<Timestamp>,
    pub customer_ref: Option<String>,
    pub subscription_ref: Option<String>,
    pub price_ref: Option<String>,
}

impl SubscriptionFacts {
    /// Facts carrying only a status.
    pub fn with_status(status: SubscriptionStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Everything a subscription snapshot reports.
    pub fn from_subscription(sub: &ProviderSubscription) -> Self {
        Self {
            status: Some(sub.status),
            current_period_end: sub.current_period_end,
            customer_ref: sub.customer_ref.clone(),
            subscription_ref: Some(sub.id.clone()),
            price_ref: sub.price_ref.clone(),
        }
    }

    pub fn customer(mut self, customer_ref: Option<String>) -> Self {
        if customer_ref.is_some() {
            self.customer_ref = customer_ref;
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Writes the provided fields onto `subscriber`.
    ///
    /// Idempotent: applying the same facts twice leaves the record unchanged
    /// the second time. Returns whether anything changed.
    pub fn apply_to(&self, subscriber: &mut Subscriber) -> bool {
        let before = subscriber.clone();

        if let Some(status) = self.status {
            subscriber.subscription_status = status;
        }
        if let Some(end) = self.current_period_end {
            subscriber.current_period_end = Some(end);
        }
        if let Some(customer) = &self.customer_ref {
            subscriber.payment_customer_ref = Some(customer.clone());
        }
        if let Some(subscription) = &self.subscription_ref {
            subscriber.payment_subscription_ref = Some(subscription.clone());
        }
        if let Some(price) = &self.price_ref {
            subscriber.payment_price_ref = Some(price.clone());
        }

        *subscriber != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscriber() -> Subscriber {
        Subscriber::new(SubscriberId::new("user-1").unwrap(), 3)
    }

    #[test]
    fn apply_writes_only_provided_fields() {
        let mut s = subscriber();
        s.payment_customer_ref = Some("cus_old".to_string());
        s.payment_price_ref = Some("price_old".to_string());

        let changed = SubscriptionFacts::with_status(SubscriptionStatus::PastDue).apply_to(&mut s);

        assert!(changed);
        assert_eq!(s.subscription_status, SubscriptionStatus::PastDue);
        assert_eq!(s.payment_customer_ref.as_deref(), Some("cus_old"));
        assert_eq!(s.payment_price_ref.as_deref(), Some("price_old"));
    }

    #[test]
    fn apply_is_idempotent() {
        let end = Timestamp::now().add_days(30);
        let facts = SubscriptionFacts {
            status: Some(SubscriptionStatus::Active),
            current_period_end: Some(end),
            customer_ref: Some("cus_1".into()),
            subscription_ref: Some("sub_1".into()),
            price_ref: Some("price_pro".into()),
        };
        let mut s = subscriber();

        assert!(facts.apply_to(&mut s));
        let after_first = s.clone();
        assert!(!facts.apply_to(&mut s));
        assert_eq!(s, after_first);
    }

    #[test]
    fn from_subscription_carries_all_fields() {
        let sub = ProviderSubscription {
            id: "sub_1".into(),
            customer_ref: Some("cus_1".into()),
            status: SubscriptionStatus::Trialing,
            price_ref: None,
            current_period_end: None,
            subscriber_hint: None,
        };
        let facts = SubscriptionFacts::from_subscription(&sub);
        assert_eq!(facts.status, Some(SubscriptionStatus::Trialing));
        assert_eq!(facts.subscription_ref.as_deref(), Some("sub_1"));
        assert!(!facts.is_empty());
        assert!(SubscriptionFacts::default().is_empty());
    }

    #[test]
    fn customer_builder_keeps_existing_when_none() {
        let facts = SubscriptionFacts::with_status(SubscriptionStatus::Active)
            .customer(Some("cus_1".into()))
            .customer(None);
        assert_eq!(facts.customer_ref.as_deref(), Some("cus_1"));
    }

    #[test]
    fn checkout_mode_defaults_to_payment() {
        assert_eq!(CheckoutMode::parse(Some("subscription")), CheckoutMode::Subscription);
        assert_eq!(CheckoutMode::parse(Some("setup")), CheckoutMode::Payment);
        assert_eq!(CheckoutMode::parse(None), CheckoutMode::Payment);
    }
}
