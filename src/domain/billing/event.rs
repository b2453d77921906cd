//! Provider webhook event envelope.
//!
//! Only fields relevant to reconciliation are captured. Additional fields
//! from the provider's event schema are ignored.

use serde::{Deserialize, Serialize};

/// Webhook event as delivered by the payment provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderEvent {
    /// Unique identifier for the event (`evt_xxx`). Idempotency key.
    pub id: String,

    /// Type of event (e.g., "checkout.session.completed").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Time at which the event was created (Unix timestamp).
    #[serde(default)]
    pub created: i64,

    pub data: ProviderEventData,

    #[serde(default)]
    pub livemode: bool,
}

/// Container for event-specific data.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderEventData {
    /// The object that triggered the event, shaped by `event_type`.
    pub object: serde_json::Value,
}

impl ProviderEvent {
    /// Parse the event type into a known variant.
    pub fn kind(&self) -> ProviderEventKind {
        ProviderEventKind::parse(&self.event_type)
    }

    /// Deserializes the data object as the specified type.
    pub fn deserialize_object<T: serde::de::DeserializeOwned>(
        &self,
    ) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.object.clone())
    }
}

/// Event types that reach the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderEventKind {
    CheckoutSessionCompleted,
    SubscriptionCreated,
    SubscriptionUpdated,
    SubscriptionDeleted,
    InvoicePaid,
    InvoicePaymentSucceeded,
    InvoicePaymentFailed,
    /// Anything else; acknowledged and ignored.
    Other,
}

impl ProviderEventKind {
    pub fn parse(s: &str) -> Self {
        match s {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "customer.subscription.created" => Self::SubscriptionCreated,
            "customer.subscription.updated" => Self::SubscriptionUpdated,
            "customer.subscription.deleted" => Self::SubscriptionDeleted,
            "invoice.paid" => Self::InvoicePaid,
            "invoice.payment_succeeded" => Self::InvoicePaymentSucceeded,
            "invoice.payment_failed" => Self::InvoicePaymentFailed,
            _ => Self::Other,
        }
    }
}

/// Builder for test events.
#[cfg(test)]
pub struct ProviderEventBuilder {
    id: String,
    event_type: String,
    object: serde_json::Value,
}

#[cfg(test)]
impl ProviderEventBuilder {
    pub fn new(event_type: &str) -> Self {
        Self {
            id: "evt_test_123".to_string(),
            event_type: event_type.to_string(),
            object: serde_json::json!({}),
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn object(mut self, object: serde_json::Value) -> Self {
        self.object = object;
        self
    }

    pub fn build(self) -> ProviderEvent {
        ProviderEvent {
            id: self.id,
            event_type: self.event_type,
            created: chrono::Utc::now().timestamp(),
            data: ProviderEventData {
                object: self.object,
            },
            livemode: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_handled_kinds() {
        assert_eq!(
            ProviderEventKind::parse("invoice.paid"),
            ProviderEventKind::InvoicePaid
        );
        assert_eq!(
            ProviderEventKind::parse("customer.subscription.deleted"),
            ProviderEventKind::SubscriptionDeleted
        );
        assert_eq!(
            ProviderEventKind::parse("customer.created"),
            ProviderEventKind::Other
        );
    }

    #[test]
    fn deserializes_minimal_envelope() {
        let json = r#"{
            "id": "evt_1",
            "type": "invoice.payment_failed",
            "data": { "object": { "id": "in_1" } }
        }"#;
        let event: ProviderEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.id, "evt_1");
        assert_eq!(event.kind(), ProviderEventKind::InvoicePaymentFailed);
        assert!(!event.livemode);
    }
}
