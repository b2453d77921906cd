//! ProcessWebhookHandler - Idempotent processing of provider webhook events.
//!
//! Delivery is at-least-once. The processed-event marker turns that into
//! effectively-once, but the marker is only kept when the facts were
//! applied; on failure it is removed so the provider's retry runs again.

use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::application::AuditTrail;
use crate::domain::audit::{AuditAction, ClientContext};
use crate::domain::billing::{
    BillingEvent, EventOutcome, ProviderEvent, ProviderInvoice, SubscriptionFacts, WebhookError,
    WebhookVerifier,
};
use crate::ports::{MarkResult, PaymentProvider, ProcessedEventStore};

use super::Reconciler;

/// Raw webhook delivery as received over HTTP.
#[derive(Debug, Clone)]
pub struct ProcessWebhookCommand {
    pub payload: Vec<u8>,
    /// `Stripe-Signature` header value.
    pub signature: String,
}

/// Handler for provider webhooks.
pub struct ProcessWebhookHandler {
    verifier: WebhookVerifier,
    processed: Arc<dyn ProcessedEventStore>,
    reconciler: Reconciler,
    provider: Arc<dyn PaymentProvider>,
    audit: AuditTrail,
}

impl ProcessWebhookHandler {
    pub fn new(
        verifier: WebhookVerifier,
        processed: Arc<dyn ProcessedEventStore>,
        reconciler: Reconciler,
        provider: Arc<dyn PaymentProvider>,
        audit: AuditTrail,
    ) -> Self {
        Self {
            verifier,
            processed,
            reconciler,
            provider,
            audit,
        }
    }

    /// Verifies the signature, then processes the event.
    ///
    /// # Errors
    ///
    /// Signature and parse failures, plus `Storage` when the idempotency
    /// store cannot be consulted. A failing handler is not an error here; it
    /// is reported as `EventOutcome::FailedAndRolledBack`.
    pub async fn handle(&self, cmd: ProcessWebhookCommand) -> Result<EventOutcome, WebhookError> {
        let event = self.verifier.verify_and_parse(&cmd.payload, &cmd.signature)?;
        self.process(&event).await
    }

    /// Processes an already verified event.
    pub async fn process(&self, event: &ProviderEvent) -> Result<EventOutcome, WebhookError> {
        // 1. Seen before: no handler runs
        if self.processed.contains(&event.id).await.map_err(storage)? {
            return Ok(self.duplicate(event).await);
        }

        // 2. A malformed object fails the same way on every retry, so it is
        //    rejected before a marker exists
        let billing = match BillingEvent::from_event(event) {
            Ok(billing) => billing,
            Err(err) => {
                warn!(event_id = %event.id, event_type = %event.event_type, error = %err, "Rejected malformed webhook event");
                self.audit_error(event, &err).await;
                return Err(err);
            }
        };

        // 3. Claim the event; a concurrent delivery loses here
        if self.processed.try_mark(&event.id).await.map_err(storage)? == MarkResult::AlreadyExists {
            return Ok(self.duplicate(event).await);
        }

        // 4. Apply, releasing the claim on failure
        match self.apply(event, billing).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                if let Err(unmark_err) = self.processed.unmark(&event.id).await {
                    error!(event_id = %event.id, error = %unmark_err, "Failed to release idempotency marker");
                }
                warn!(event_id = %event.id, event_type = %event.event_type, error = %err, "Webhook handler failed, marker released");
                self.audit_error(event, &err).await;
                Ok(EventOutcome::FailedAndRolledBack {
                    reason: err.to_string(),
                })
            }
        }
    }

    async fn apply(
        &self,
        event: &ProviderEvent,
        billing: BillingEvent,
    ) -> Result<EventOutcome, WebhookError> {
        let (lookup, facts, payment_failed) = match billing {
            BillingEvent::CheckoutCompleted { lookup, facts }
            | BillingEvent::SubscriptionChanged { lookup, facts } => (lookup, facts, false),
            BillingEvent::InvoicePaid {
                invoice_id,
                mut lookup,
                mut facts,
            } => {
                if let Some(invoice) = self.retrieve_invoice(&invoice_id).await? {
                    invoice.refine_lookup(&mut lookup);
                    invoice.refine_paid_facts(&mut facts);
                }
                let facts = self.fill_period_end(facts, lookup.subscription_ref.clone()).await?;
                (lookup, facts, false)
            }
            BillingEvent::InvoicePaymentFailed {
                invoice_id,
                mut lookup,
                facts,
            } => {
                if let Some(invoice) = self.retrieve_invoice(&invoice_id).await? {
                    invoice.refine_lookup(&mut lookup);
                }
                (lookup, facts, true)
            }
            BillingEvent::Unhandled(event_type) => {
                debug!(event_id = %event.id, event_type = %event_type, "Ignoring webhook event type");
                self.audit
                    .record(
                        AuditAction::WebhookIgnored,
                        None,
                        &ClientContext::system(),
                        json!({ "eventId": event.id, "type": event_type }),
                    )
                    .await;
                return Ok(EventOutcome::Ignored { event_type });
            }
        };

        let subscriber = self.reconciler.apply(&lookup, &facts).await.map_err(storage)?;
        let subscriber_id = subscriber.map(|s| s.id);
        let unmatched = subscriber_id.is_none();
        if unmatched {
            warn!(event_id = %event.id, event_type = %event.event_type, "Webhook event matched no subscriber");
        }

        if payment_failed {
            self.audit
                .record(
                    AuditAction::InvoicePaymentFailed,
                    subscriber_id.as_ref(),
                    &ClientContext::system(),
                    json!({
                        "eventId": event.id,
                        "customerRef": facts.customer_ref,
                        "subscriptionRef": lookup.subscription_ref,
                    }),
                )
                .await;
        }

        self.audit
            .record(
                AuditAction::WebhookProcessed,
                subscriber_id.as_ref(),
                &ClientContext::system(),
                json!({
                    "eventId": event.id,
                    "type": event.event_type,
                    "status": facts.status.map(|s| s.as_str()),
                    "unmatched": unmatched,
                }),
            )
            .await;

        info!(event_id = %event.id, event_type = %event.event_type, unmatched, "Webhook event processed");
        Ok(EventOutcome::Processed {
            subscriber: subscriber_id,
        })
    }

    /// The full invoice, lines expanded. `None` when the provider no longer
    /// knows it; the event's own copy is used then.
    async fn retrieve_invoice(
        &self,
        invoice_id: &str,
    ) -> Result<Option<ProviderInvoice>, WebhookError> {
        self.provider
            .retrieve_invoice(invoice_id)
            .await
            .map_err(|e| WebhookError::Provider(e.to_string()))
    }

    /// Invoices without a line period take the end from the subscription.
    async fn fill_period_end(
        &self,
        mut facts: SubscriptionFacts,
        subscription_ref: Option<String>,
    ) -> Result<SubscriptionFacts, WebhookError> {
        if facts.current_period_end.is_some() {
            return Ok(facts);
        }
        if let Some(subscription_ref) = subscription_ref {
            let subscription = self
                .provider
                .retrieve_subscription(&subscription_ref)
                .await
                .map_err(|e| WebhookError::Provider(e.to_string()))?;
            if let Some(subscription) = subscription {
                facts.current_period_end = subscription.current_period_end;
                if facts.price_ref.is_none() {
                    facts.price_ref = subscription.price_ref;
                }
            }
        }
        Ok(facts)
    }

    async fn duplicate(&self, event: &ProviderEvent) -> EventOutcome {
        info!(event_id = %event.id, event_type = %event.event_type, "Duplicate webhook delivery");
        self.audit
            .record(
                AuditAction::WebhookDuplicate,
                None,
                &ClientContext::system(),
                json!({ "eventId": event.id, "type": event.event_type }),
            )
            .await;
        EventOutcome::Duplicate
    }

    async fn audit_error(&self, event: &ProviderEvent, err: &WebhookError) {
        self.audit
            .record(
                AuditAction::WebhookError,
                None,
                &ClientContext::system(),
                json!({
                    "eventId": event.id,
                    "type": event.event_type,
                    "error": err.code(),
                    "message": err.to_string(),
                }),
            )
            .await;
    }
}

fn storage(err: impl std::fmt::Display) -> WebhookError {
    WebhookError::Storage(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{
        InMemoryAuditLog, InMemoryEntitlementStore, InMemoryProcessedEventStore,
    };
    use crate::adapters::stripe::MockPaymentProvider;
    use crate::domain::billing::{sign_payload, ProviderSubscription};
    use crate::ports::PaymentError;
    use crate::domain::entitlement::{compute, GracePolicy, Subscriber, SubscriptionStatus};
    use crate::domain::foundation::{SubscriberId, Timestamp};
    use crate::ports::SubscriberRepository;
    use secrecy::SecretString;
    use serde_json::Value;

    const SECRET: &str = "whsec_test_secret";

    // ════════════════════════════════════════════════════════════════════════════
    // Test Helpers
    // ════════════════════════════════════════════════════════════════════════════

    struct Fixture {
        store: InMemoryEntitlementStore,
        processed: InMemoryProcessedEventStore,
        provider: MockPaymentProvider,
        audit: InMemoryAuditLog,
        handler: ProcessWebhookHandler,
    }

    async fn fixture() -> Fixture {
        let store = InMemoryEntitlementStore::new();
        let mut alice = Subscriber::new(SubscriberId::new("alice").unwrap(), 3);
        alice.payment_customer_ref = Some("cus_alice".into());
        alice.payment_subscription_ref = Some("sub_alice".into());
        store.insert_subscriber(alice).await;

        let processed = InMemoryProcessedEventStore::new();
        let provider = MockPaymentProvider::new();
        let audit = InMemoryAuditLog::new();
        let handler = ProcessWebhookHandler::new(
            WebhookVerifier::new(SecretString::new(SECRET.to_string())),
            Arc::new(processed.clone()),
            Reconciler::new(Arc::new(store.clone()), 3),
            Arc::new(provider.clone()),
            AuditTrail::new(Arc::new(audit.clone())),
        );
        Fixture {
            store,
            processed,
            provider,
            audit,
            handler,
        }
    }

    fn event(id: &str, event_type: &str, object: Value) -> ProviderEvent {
        serde_json::from_value(json!({
            "id": id,
            "type": event_type,
            "created": 1_704_067_200,
            "data": { "object": object },
            "livemode": false
        }))
        .unwrap()
    }

    fn checkout_completed(id: &str) -> ProviderEvent {
        event(
            id,
            "checkout.session.completed",
            json!({
                "id": "cs_1",
                "mode": "subscription",
                "client_reference_id": "alice",
                "customer": "cus_alice",
                "subscription": "sub_alice"
            }),
        )
    }

    async fn alice(store: &InMemoryEntitlementStore) -> Subscriber {
        store
            .find(&SubscriberId::new("alice").unwrap())
            .await
            .unwrap()
            .unwrap()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Idempotency
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn second_delivery_is_duplicate() {
        let f = fixture().await;
        let evt = checkout_completed("evt_1");

        let first = f.handler.process(&evt).await.unwrap();
        assert!(matches!(first, EventOutcome::Processed { subscriber: Some(_) }));
        assert_eq!(alice(&f.store).await.subscription_status, SubscriptionStatus::Active);

        let second = f.handler.process(&evt).await.unwrap();
        assert!(second.is_duplicate());
        assert_eq!(
            f.audit.actions().await,
            vec![AuditAction::WebhookProcessed, AuditAction::WebhookDuplicate]
        );
    }

    #[tokio::test]
    async fn handler_failure_releases_marker_for_retry() {
        let f = fixture().await;
        f.store.inject_write_failures(1);
        let evt = checkout_completed("evt_fail");

        let first = f.handler.process(&evt).await.unwrap();
        assert!(first.should_retry());
        assert_eq!(f.processed.len().await, 0);
        assert_eq!(f.audit.with_action(AuditAction::WebhookError).await.len(), 1);

        let retry = f.handler.process(&evt).await.unwrap();
        assert!(matches!(retry, EventOutcome::Processed { .. }));
        assert_eq!(f.processed.len().await, 1);
    }

    #[tokio::test]
    async fn malformed_object_is_rejected_without_marker() {
        let f = fixture().await;
        let evt = event("evt_bad", "customer.subscription.updated", json!({ "status": 7 }));

        let err = f.handler.process(&evt).await.unwrap_err();
        assert!(matches!(err, WebhookError::ParseError(_)));
        assert_eq!(f.processed.len().await, 0);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Event Mapping
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn unhandled_type_is_ignored_and_marked() {
        let f = fixture().await;
        let evt = event("evt_other", "customer.created", json!({ "id": "cus_9" }));

        let outcome = f.handler.process(&evt).await.unwrap();
        assert_eq!(
            outcome,
            EventOutcome::Ignored {
                event_type: "customer.created".to_string()
            }
        );
        assert_eq!(f.processed.len().await, 1);
        assert_eq!(f.audit.actions().await, vec![AuditAction::WebhookIgnored]);
    }

    #[tokio::test]
    async fn unmatched_subscriber_is_acknowledged() {
        let f = fixture().await;
        let evt = event(
            "evt_orphan",
            "invoice.payment_failed",
            json!({ "id": "in_1", "customer": "cus_nobody" }),
        );

        let outcome = f.handler.process(&evt).await.unwrap();
        assert_eq!(outcome, EventOutcome::Processed { subscriber: None });
        let processed = f.audit.with_action(AuditAction::WebhookProcessed).await;
        assert_eq!(processed[0].metadata["unmatched"], true);
    }

    #[tokio::test]
    async fn payment_failure_marks_past_due() {
        let f = fixture().await;
        let evt = event(
            "evt_pf",
            "invoice.payment_failed",
            json!({ "id": "in_2", "customer": "cus_alice", "subscription": "sub_alice" }),
        );

        f.handler.process(&evt).await.unwrap();
        assert_eq!(alice(&f.store).await.subscription_status, SubscriptionStatus::PastDue);
        assert_eq!(
            f.audit.actions().await,
            vec![AuditAction::InvoicePaymentFailed, AuditAction::WebhookProcessed]
        );
    }

    #[tokio::test]
    async fn invoice_without_period_reads_subscription() {
        let f = fixture().await;
        let period_end = Timestamp::now().add_days(30);
        f.provider.add_subscription(ProviderSubscription {
            id: "sub_alice".into(),
            customer_ref: Some("cus_alice".into()),
            status: SubscriptionStatus::Active,
            price_ref: Some("price_pro".into()),
            current_period_end: Timestamp::from_unix_secs(period_end.as_unix_secs()),
            subscriber_hint: None,
        });
        let evt = event(
            "evt_paid",
            "invoice.paid",
            json!({ "id": "in_3", "customer": "cus_alice", "subscription": "sub_alice" }),
        );

        f.handler.process(&evt).await.unwrap();

        let stored = alice(&f.store).await;
        assert_eq!(f.provider.call_count("retrieve_subscription"), 1);
        assert_eq!(
            stored.current_period_end.map(|t| t.as_unix_secs()),
            Some(period_end.as_unix_secs())
        );
        assert_eq!(stored.payment_price_ref.as_deref(), Some("price_pro"));
    }

    #[tokio::test]
    async fn provider_failure_during_invoice_rolls_back() {
        let f = fixture().await;
        f.provider.fail_method(
            "retrieve_subscription",
            PaymentError::timeout("retrieve subscription"),
        );
        let evt = event(
            "evt_paid_2",
            "invoice.paid",
            json!({ "id": "in_4", "customer": "cus_alice", "subscription": "sub_alice" }),
        );

        let outcome = f.handler.process(&evt).await.unwrap();
        assert!(outcome.should_retry());
        assert_eq!(f.processed.len().await, 0);
    }

    #[tokio::test]
    async fn trimmed_invoice_is_reread_from_provider() {
        let f = fixture().await;
        let period_end = Timestamp::from_unix_secs(Timestamp::now().add_days(30).as_unix_secs());
        f.provider.add_invoice(ProviderInvoice {
            id: "in_trim".into(),
            customer_ref: Some("cus_alice".into()),
            subscription_ref: Some("sub_alice".into()),
            period_end,
            price_ref: Some("price_annual".into()),
        });
        let evt = event("evt_trim", "invoice.paid", json!({ "id": "in_trim" }));

        let outcome = f.handler.process(&evt).await.unwrap();

        assert!(matches!(outcome, EventOutcome::Processed { subscriber: Some(_) }));
        assert_eq!(f.provider.call_count("retrieve_invoice"), 1);
        assert_eq!(f.provider.call_count("retrieve_subscription"), 0);
        let stored = alice(&f.store).await;
        assert_eq!(stored.subscription_status, SubscriptionStatus::Active);
        assert_eq!(stored.current_period_end, period_end);
        assert_eq!(stored.payment_price_ref.as_deref(), Some("price_annual"));
    }

    #[tokio::test]
    async fn invoice_retrieval_failure_rolls_back() {
        let f = fixture().await;
        f.provider
            .fail_method("retrieve_invoice", PaymentError::network("connection reset"));
        let evt = event(
            "evt_paid_net",
            "invoice.paid",
            json!({ "id": "in_net", "customer": "cus_alice" }),
        );

        let outcome = f.handler.process(&evt).await.unwrap();
        assert!(outcome.should_retry());
        assert_eq!(f.processed.len().await, 0);
    }

    #[tokio::test]
    async fn failed_invoice_takes_refs_but_not_period_from_provider() {
        let f = fixture().await;
        f.provider.add_invoice(ProviderInvoice {
            id: "in_fail".into(),
            customer_ref: Some("cus_alice".into()),
            subscription_ref: Some("sub_alice".into()),
            period_end: Timestamp::from_unix_secs(1_900_000_000),
            price_ref: None,
        });
        let evt = event("evt_fail_trim", "invoice.payment_failed", json!({ "id": "in_fail" }));

        let outcome = f.handler.process(&evt).await.unwrap();

        assert!(matches!(outcome, EventOutcome::Processed { subscriber: Some(_) }));
        let stored = alice(&f.store).await;
        assert_eq!(stored.subscription_status, SubscriptionStatus::PastDue);
        assert_eq!(stored.current_period_end, None);
    }

    #[tokio::test]
    async fn past_due_with_paid_invoice_period_is_pro() {
        let f = fixture().await;
        let period_end = Timestamp::now().add_days(30).as_unix_secs();
        f.store
            .apply_facts(
                &SubscriberId::new("alice").unwrap(),
                &SubscriptionFacts::with_status(SubscriptionStatus::PastDue),
            )
            .await
            .unwrap();

        let evt = event(
            "evt_paid_3",
            "invoice.paid",
            json!({
                "id": "in_5",
                "customer": "cus_alice",
                "subscription": "sub_alice",
                "lines": { "data": [ { "period": { "start": 1, "end": period_end } } ] }
            }),
        );
        f.handler.process(&evt).await.unwrap();

        // A later update reporting past_due again keeps the paid period.
        let update = event(
            "evt_sub_pd",
            "customer.subscription.updated",
            json!({ "id": "sub_alice", "customer": "cus_alice", "status": "past_due" }),
        );
        f.handler.process(&update).await.unwrap();

        let stored = alice(&f.store).await;
        assert_eq!(stored.subscription_status, SubscriptionStatus::PastDue);
        let ent = compute(&stored, 3, Timestamp::now(), &GracePolicy::default());
        assert!(ent.is_pro);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Signature
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn handle_verifies_signature() {
        let f = fixture().await;
        let payload = serde_json::to_vec(&checkout_completed("evt_signed")).unwrap();
        let now = chrono::Utc::now().timestamp();

        let bad = ProcessWebhookCommand {
            payload: payload.clone(),
            signature: sign_payload("whsec_wrong", now, &payload),
        };
        assert_eq!(
            f.handler.handle(bad).await.unwrap_err(),
            WebhookError::InvalidSignature
        );

        let good = ProcessWebhookCommand {
            signature: sign_payload(SECRET, now, &payload),
            payload,
        };
        assert!(matches!(
            f.handler.handle(good).await.unwrap(),
            EventOutcome::Processed { .. }
        ));
    }
}
