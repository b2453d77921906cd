//! Maps provider events onto subscriber lookups and facts.

use crate::domain::entitlement::SubscriptionStatus;
use crate::domain::foundation::{SubscriberId, Timestamp};

use super::errors::WebhookError;
use super::event::{ProviderEvent, ProviderEventKind};
use super::facts::{SubscriberLookup, SubscriptionFacts};
use super::objects::{CheckoutSessionObject, InvoiceObject, SubscriptionObject};

/// What a provider event asks the reconciler to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingEvent {
    CheckoutCompleted {
        lookup: SubscriberLookup,
        facts: SubscriptionFacts,
    },
    SubscriptionChanged {
        lookup: SubscriberLookup,
        facts: SubscriptionFacts,
    },
    /// Invoice settled. The embedded lines may be trimmed, so the invoice
    /// is re-read by `invoice_id`; when no line carries a period end, the
    /// period end comes from the subscription.
    InvoicePaid {
        invoice_id: String,
        lookup: SubscriberLookup,
        facts: SubscriptionFacts,
    },
    InvoicePaymentFailed {
        invoice_id: String,
        lookup: SubscriberLookup,
        facts: SubscriptionFacts,
    },
    /// Recognised envelope, event type not handled here.
    Unhandled(String),
}

impl BillingEvent {
    /// Interprets a verified provider event.
    ///
    /// # Errors
    ///
    /// `ParseError` when the data object does not match the event type.
    pub fn from_event(event: &ProviderEvent) -> Result<Self, WebhookError> {
        let parse_err = |e: serde_json::Error| WebhookError::ParseError(e.to_string());

        match event.kind() {
            ProviderEventKind::CheckoutSessionCompleted => {
                let session: CheckoutSessionObject = event.deserialize_object().map_err(parse_err)?;
                Ok(checkout_completed(&session))
            }
            ProviderEventKind::SubscriptionCreated
            | ProviderEventKind::SubscriptionUpdated
            | ProviderEventKind::SubscriptionDeleted => {
                let sub: SubscriptionObject = event.deserialize_object().map_err(parse_err)?;
                Ok(subscription_changed(&sub))
            }
            ProviderEventKind::InvoicePaid | ProviderEventKind::InvoicePaymentSucceeded => {
                let invoice: InvoiceObject = event.deserialize_object().map_err(parse_err)?;
                Ok(invoice_paid(&invoice))
            }
            ProviderEventKind::InvoicePaymentFailed => {
                let invoice: InvoiceObject = event.deserialize_object().map_err(parse_err)?;
                Ok(BillingEvent::InvoicePaymentFailed {
                    invoice_id: invoice.id.clone(),
                    lookup: invoice_lookup(&invoice),
                    facts: SubscriptionFacts::with_status(SubscriptionStatus::PastDue)
                        .customer(invoice.customer.as_ref().map(|c| c.id().to_string())),
                })
            }
            ProviderEventKind::Other => Ok(BillingEvent::Unhandled(event.event_type.clone())),
        }
    }
}

fn subscriber_id(raw: Option<&str>) -> Option<SubscriberId> {
    raw.and_then(|id| SubscriberId::new(id).ok())
}

fn checkout_completed(session: &CheckoutSessionObject) -> BillingEvent {
    let customer_ref = session.customer.as_ref().map(|c| c.id().to_string());
    let subscription_ref = session.subscription.as_ref().map(|s| s.id().to_string());

    BillingEvent::CheckoutCompleted {
        lookup: SubscriberLookup {
            subscriber_id: subscriber_id(session.subscriber_ref()),
            subscription_ref: None,
            customer_ref: customer_ref.clone(),
        },
        facts: SubscriptionFacts {
            status: Some(SubscriptionStatus::Active),
            customer_ref,
            subscription_ref,
            ..Default::default()
        },
    }
}

fn subscription_changed(sub: &SubscriptionObject) -> BillingEvent {
    let snapshot = sub.to_provider_subscription();
    BillingEvent::SubscriptionChanged {
        lookup: SubscriberLookup {
            subscriber_id: subscriber_id(snapshot.subscriber_hint.as_deref()),
            subscription_ref: Some(snapshot.id.clone()),
            customer_ref: snapshot.customer_ref.clone(),
        },
        facts: SubscriptionFacts::from_subscription(&snapshot),
    }
}

fn invoice_lookup(invoice: &InvoiceObject) -> SubscriberLookup {
    SubscriberLookup {
        subscriber_id: None,
        subscription_ref: invoice.subscription.as_ref().map(|s| s.id().to_string()),
        customer_ref: invoice.customer.as_ref().map(|c| c.id().to_string()),
    }
}

fn invoice_paid(invoice: &InvoiceObject) -> BillingEvent {
    let snapshot = invoice.to_provider_invoice();
    let current_period_end = snapshot.period_end.or_else(|| {
        invoice
            .subscription
            .as_ref()
            .and_then(|s| s.object())
            .and_then(|s| s.current_period_end)
            .and_then(Timestamp::from_unix_secs)
    });

    BillingEvent::InvoicePaid {
        invoice_id: snapshot.id,
        lookup: invoice_lookup(invoice),
        facts: SubscriptionFacts {
            status: Some(SubscriptionStatus::Active),
            current_period_end,
            customer_ref: snapshot.customer_ref,
            subscription_ref: snapshot.subscription_ref,
            price_ref: snapshot.price_ref,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::event::ProviderEventBuilder;
    use serde_json::json;

    #[test]
    fn checkout_completed_marks_active_and_records_refs() {
        let event = ProviderEventBuilder::new("checkout.session.completed")
            .object(json!({
                "id": "cs_1",
                "mode": "subscription",
                "client_reference_id": "user-1",
                "customer": "cus_1",
                "subscription": "sub_1"
            }))
            .build();

        match BillingEvent::from_event(&event).unwrap() {
            BillingEvent::CheckoutCompleted { lookup, facts } => {
                assert_eq!(lookup.subscriber_id.unwrap().as_str(), "user-1");
                assert_eq!(lookup.customer_ref.as_deref(), Some("cus_1"));
                assert_eq!(facts.status, Some(SubscriptionStatus::Active));
                assert_eq!(facts.subscription_ref.as_deref(), Some("sub_1"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn subscription_deleted_carries_provider_status() {
        let event = ProviderEventBuilder::new("customer.subscription.deleted")
            .object(json!({
                "id": "sub_1",
                "customer": "cus_1",
                "status": "canceled",
                "current_period_end": 1_900_000_000,
                "items": { "data": [ { "price": { "id": "price_pro" } } ] }
            }))
            .build();

        match BillingEvent::from_event(&event).unwrap() {
            BillingEvent::SubscriptionChanged { lookup, facts } => {
                assert!(lookup.subscriber_id.is_none());
                assert_eq!(lookup.subscription_ref.as_deref(), Some("sub_1"));
                assert_eq!(facts.status, Some(SubscriptionStatus::Canceled));
                assert_eq!(facts.price_ref.as_deref(), Some("price_pro"));
                assert!(facts.current_period_end.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn invoice_paid_takes_period_end_from_first_line() {
        let event = ProviderEventBuilder::new("invoice.paid")
            .object(json!({
                "id": "in_1",
                "customer": "cus_1",
                "subscription": "sub_1",
                "lines": { "data": [
                    { "period": { "start": 1_700_000_000, "end": 1_702_592_000 }, "price": { "id": "price_pro" } }
                ] }
            }))
            .build();

        match BillingEvent::from_event(&event).unwrap() {
            BillingEvent::InvoicePaid {
                invoice_id,
                facts,
                ..
            } => {
                assert_eq!(invoice_id, "in_1");
                assert_eq!(
                    facts.current_period_end.map(|t| t.as_unix_secs()),
                    Some(1_702_592_000)
                );
                assert_eq!(facts.price_ref.as_deref(), Some("price_pro"));
                assert_eq!(facts.subscription_ref.as_deref(), Some("sub_1"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn invoice_paid_without_lines_leaves_period_end_open() {
        let event = ProviderEventBuilder::new("invoice.payment_succeeded")
            .object(json!({ "id": "in_1", "subscription": "sub_1" }))
            .build();

        match BillingEvent::from_event(&event).unwrap() {
            BillingEvent::InvoicePaid { facts, .. } => {
                assert!(facts.current_period_end.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn payment_failed_sets_past_due() {
        let event = ProviderEventBuilder::new("invoice.payment_failed")
            .object(json!({ "id": "in_1", "customer": "cus_1" }))
            .build();

        match BillingEvent::from_event(&event).unwrap() {
            BillingEvent::InvoicePaymentFailed { lookup, facts, .. } => {
                assert_eq!(lookup.customer_ref.as_deref(), Some("cus_1"));
                assert_eq!(facts.status, Some(SubscriptionStatus::PastDue));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unknown_types_are_unhandled() {
        let event = ProviderEventBuilder::new("customer.created").build();
        assert_eq!(
            BillingEvent::from_event(&event).unwrap(),
            BillingEvent::Unhandled("customer.created".to_string())
        );
    }

    #[test]
    fn mismatched_object_is_a_parse_error() {
        let event = ProviderEventBuilder::new("customer.subscription.updated")
            .object(json!({ "status": "active" }))
            .build();
        assert!(matches!(
            BillingEvent::from_event(&event),
            Err(WebhookError::ParseError(_))
        ));
    }
}
