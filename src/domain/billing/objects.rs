//! Provider object shapes shared by webhook payloads and API responses.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::entitlement::SubscriptionStatus;
use crate::domain::foundation::Timestamp;

use super::facts::{CheckoutMode, CheckoutSessionSnapshot, ProviderInvoice, ProviderSubscription};

/// A field the provider returns either as an id or as the expanded object.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Expandable<T> {
    Id(String),
    Object(Box<T>),
}

impl<T: HasId> Expandable<T> {
    pub fn id(&self) -> &str {
        match self {
            Expandable::Id(id) => id,
            Expandable::Object(obj) => obj.object_id(),
        }
    }

    pub fn object(&self) -> Option<&T> {
        match self {
            Expandable::Id(_) => None,
            Expandable::Object(obj) => Some(obj),
        }
    }
}

/// Objects addressable by provider id.
pub trait HasId {
    fn object_id(&self) -> &str;
}

/// Minimal customer object, used when a customer field arrives expanded.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CustomerObject {
    pub id: String,
}

impl HasId for CustomerObject {
    fn object_id(&self) -> &str {
        &self.id
    }
}

/// Paginated list wrapper (`{"object": "list", "data": [...]}`).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ListObject<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

impl<T> Default for ListObject<T> {
    fn default() -> Self {
        Self { data: Vec::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PriceObject {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SubscriptionItemObject {
    pub price: Option<PriceObject>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SubscriptionObject {
    pub id: String,
    pub customer: Option<Expandable<CustomerObject>>,
    pub status: Option<String>,
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub items: ListObject<SubscriptionItemObject>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl HasId for SubscriptionObject {
    fn object_id(&self) -> &str {
        &self.id
    }
}

impl SubscriptionObject {
    /// Price of the first subscription item.
    pub fn first_price_id(&self) -> Option<&str> {
        self.items
            .data
            .first()
            .and_then(|item| item.price.as_ref())
            .map(|price| price.id.as_str())
    }

    /// Converts to the provider-neutral subscription snapshot.
    pub fn to_provider_subscription(&self) -> ProviderSubscription {
        ProviderSubscription {
            id: self.id.clone(),
            customer_ref: self.customer.as_ref().map(|c| c.id().to_string()),
            status: self
                .status
                .as_deref()
                .map(SubscriptionStatus::parse)
                .unwrap_or(SubscriptionStatus::Unknown),
            price_ref: self.first_price_id().map(str::to_string),
            current_period_end: self.current_period_end.and_then(Timestamp::from_unix_secs),
            subscriber_hint: self.metadata.get("userId").cloned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CheckoutSessionObject {
    pub id: String,
    pub mode: Option<String>,
    pub payment_status: Option<String>,
    pub client_reference_id: Option<String>,
    pub customer: Option<Expandable<CustomerObject>>,
    pub subscription: Option<Expandable<SubscriptionObject>>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub url: Option<String>,
}

impl CheckoutSessionObject {
    /// Subscriber reference embedded at checkout creation.
    pub fn subscriber_ref(&self) -> Option<&str> {
        self.client_reference_id
            .as_deref()
            .or_else(|| self.metadata.get("userId").map(String::as_str))
            .filter(|s| !s.is_empty())
    }

    /// Converts to the provider-neutral checkout snapshot.
    pub fn to_snapshot(&self) -> CheckoutSessionSnapshot {
        CheckoutSessionSnapshot {
            id: self.id.clone(),
            mode: CheckoutMode::parse(self.mode.as_deref()),
            paid: self.payment_status.as_deref() == Some("paid"),
            subscriber_ref: self.subscriber_ref().map(str::to_string),
            customer_ref: self.customer.as_ref().map(|c| c.id().to_string()),
            subscription_ref: self.subscription.as_ref().map(|s| s.id().to_string()),
            subscription: self
                .subscription
                .as_ref()
                .and_then(Expandable::object)
                .map(SubscriptionObject::to_provider_subscription),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PeriodObject {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InvoiceLineObject {
    pub period: Option<PeriodObject>,
    pub price: Option<PriceObject>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InvoiceObject {
    pub id: String,
    pub customer: Option<Expandable<CustomerObject>>,
    pub subscription: Option<Expandable<SubscriptionObject>>,
    #[serde(default)]
    pub lines: ListObject<InvoiceLineObject>,
}

impl InvoiceObject {
    /// First line carrying a period end.
    pub fn first_period_line(&self) -> Option<&InvoiceLineObject> {
        self.lines
            .data
            .iter()
            .find(|line| line.period.as_ref().and_then(|p| p.end).is_some())
    }

    pub fn to_provider_invoice(&self) -> ProviderInvoice {
        let line = self.first_period_line();
        ProviderInvoice {
            id: self.id.clone(),
            customer_ref: self.customer.as_ref().map(|c| c.id().to_string()),
            subscription_ref: self.subscription.as_ref().map(|s| s.id().to_string()),
            period_end: line
                .and_then(|l| l.period.as_ref())
                .and_then(|p| p.end)
                .and_then(Timestamp::from_unix_secs),
            price_ref: line.and_then(|l| l.price.as_ref()).map(|p| p.id.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expandable_reads_both_shapes() {
        let id: Expandable<CustomerObject> = serde_json::from_value(json!("cus_1")).unwrap();
        let obj: Expandable<CustomerObject> =
            serde_json::from_value(json!({ "id": "cus_2", "email": "x@example.com" })).unwrap();
        assert_eq!(id.id(), "cus_1");
        assert!(id.object().is_none());
        assert_eq!(obj.id(), "cus_2");
    }

    #[test]
    fn subscription_converts_to_snapshot() {
        let sub: SubscriptionObject = serde_json::from_value(json!({
            "id": "sub_1",
            "customer": "cus_1",
            "status": "past_due",
            "current_period_end": 1_705_276_800,
            "items": { "object": "list", "data": [ { "price": { "id": "price_pro" } } ] },
            "metadata": { "userId": "user-1" }
        }))
        .unwrap();

        let snapshot = sub.to_provider_subscription();
        assert_eq!(snapshot.status, SubscriptionStatus::PastDue);
        assert_eq!(snapshot.price_ref.as_deref(), Some("price_pro"));
        assert_eq!(snapshot.customer_ref.as_deref(), Some("cus_1"));
        assert_eq!(snapshot.subscriber_hint.as_deref(), Some("user-1"));
        assert_eq!(
            snapshot.current_period_end.map(|t| t.as_unix_secs()),
            Some(1_705_276_800)
        );
    }

    #[test]
    fn checkout_subscriber_ref_prefers_client_reference() {
        let cs: CheckoutSessionObject = serde_json::from_value(json!({
            "id": "cs_1",
            "client_reference_id": "user-a",
            "metadata": { "userId": "user-b" }
        }))
        .unwrap();
        assert_eq!(cs.subscriber_ref(), Some("user-a"));

        let cs: CheckoutSessionObject = serde_json::from_value(json!({
            "id": "cs_2",
            "metadata": { "userId": "user-b" }
        }))
        .unwrap();
        assert_eq!(cs.subscriber_ref(), Some("user-b"));
    }

    #[test]
    fn checkout_snapshot_reads_expanded_subscription() {
        let cs: CheckoutSessionObject = serde_json::from_value(json!({
            "id": "cs_1",
            "mode": "subscription",
            "payment_status": "paid",
            "client_reference_id": "user-a",
            "customer": "cus_1",
            "subscription": { "id": "sub_1", "status": "active" }
        }))
        .unwrap();

        let snapshot = cs.to_snapshot();
        assert_eq!(snapshot.mode, CheckoutMode::Subscription);
        assert!(snapshot.paid);
        assert_eq!(snapshot.subscription_ref.as_deref(), Some("sub_1"));
        assert_eq!(
            snapshot.subscription.map(|s| s.status),
            Some(SubscriptionStatus::Active)
        );
    }

    #[test]
    fn invoice_skips_lines_without_period_end() {
        let invoice: InvoiceObject = serde_json::from_value(json!({
            "id": "in_1",
            "lines": { "data": [
                { "period": { "start": 1 }, "price": { "id": "price_setup" } },
                { "period": { "start": 1, "end": 2_000_000_000 }, "price": { "id": "price_pro" } }
            ] }
        }))
        .unwrap();
        let line = invoice.first_period_line().unwrap();
        assert_eq!(line.price.as_ref().unwrap().id, "price_pro");
    }
}
