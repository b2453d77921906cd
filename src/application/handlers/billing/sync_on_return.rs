//! SyncOnReturnHandler - Reconciles a subscriber when the browser returns
//! from hosted checkout.
//!
//! Reads the session straight from the provider instead of waiting for the
//! webhook, and applies what it finds through the same reconciler.

use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::AuditTrail;
use crate::domain::audit::{AuditAction, ClientContext};
use crate::domain::billing::{CheckoutMode, SubscriptionFacts};
use crate::domain::entitlement::SubscriptionStatus;
use crate::domain::foundation::SubscriberId;
use crate::ports::PaymentProvider;

use super::{BillingError, Reconciler};

/// Command carrying the `session_id` from the return URL.
#[derive(Debug, Clone)]
pub struct SyncOnReturnCommand {
    pub subscriber_id: SubscriberId,
    pub session_id: Option<String>,
    pub client: ClientContext,
}

/// What the return sync applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum SyncOnReturnResult {
    Subscription { status: SubscriptionStatus },
    Payment { paid: bool },
}

/// Handler for return-URL sync.
pub struct SyncOnReturnHandler {
    provider: Arc<dyn PaymentProvider>,
    reconciler: Reconciler,
    audit: AuditTrail,
}

impl SyncOnReturnHandler {
    pub fn new(
        provider: Arc<dyn PaymentProvider>,
        reconciler: Reconciler,
        audit: AuditTrail,
    ) -> Self {
        Self {
            provider,
            reconciler,
            audit,
        }
    }

    /// # Errors
    ///
    /// - `MissingSessionId` - no session reference supplied
    /// - `Forbidden` - the session was created for a different subscriber
    /// - `MissingSubscription` - subscription checkout without a subscription
    /// - `SyncFailed` - provider or store failure
    pub async fn handle(&self, cmd: SyncOnReturnCommand) -> Result<SyncOnReturnResult, BillingError> {
        let session_id = cmd
            .session_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(BillingError::MissingSessionId)?;

        let session = self
            .provider
            .retrieve_checkout_session(session_id)
            .await
            .map_err(|e| BillingError::SyncFailed(e.to_string()))?;

        // Guard against applying someone else's checkout to the caller.
        if session.subscriber_ref.as_deref() != Some(cmd.subscriber_id.as_str()) {
            warn!(
                subscriber_id = %cmd.subscriber_id,
                session_id = %session_id,
                "Checkout session belongs to another subscriber"
            );
            return Err(BillingError::Forbidden);
        }

        match session.mode {
            CheckoutMode::Subscription => {
                let subscription = match session.subscription {
                    Some(subscription) => subscription,
                    None => {
                        let subscription_ref = session
                            .subscription_ref
                            .as_deref()
                            .ok_or(BillingError::MissingSubscription)?;
                        self.provider
                            .retrieve_subscription(subscription_ref)
                            .await
                            .map_err(|e| BillingError::SyncFailed(e.to_string()))?
                            .ok_or(BillingError::MissingSubscription)?
                    }
                };

                let facts = SubscriptionFacts::from_subscription(&subscription)
                    .customer(session.customer_ref.clone());
                let subscriber = self
                    .reconciler
                    .apply_for(&cmd.subscriber_id, &facts)
                    .await
                    .map_err(|e| BillingError::SyncFailed(e.to_string()))?;
                let status = subscriber.subscription_status;

                info!(subscriber_id = %cmd.subscriber_id, status = %status, "Synced subscription on return");
                self.audit
                    .record(
                        AuditAction::SyncSubscription,
                        Some(&cmd.subscriber_id),
                        &cmd.client,
                        json!({
                            "sessionId": session_id,
                            "subscriptionRef": subscription.id,
                            "status": status.as_str(),
                        }),
                    )
                    .await;
                Ok(SyncOnReturnResult::Subscription { status })
            }
            CheckoutMode::Payment => {
                if session.paid {
                    let facts = SubscriptionFacts::with_status(SubscriptionStatus::Active)
                        .customer(session.customer_ref.clone());
                    self.reconciler
                        .apply_for(&cmd.subscriber_id, &facts)
                        .await
                        .map_err(|e| BillingError::SyncFailed(e.to_string()))?;
                }

                info!(subscriber_id = %cmd.subscriber_id, paid = session.paid, "Synced one-time payment on return");
                self.audit
                    .record(
                        AuditAction::SyncPayment,
                        Some(&cmd.subscriber_id),
                        &cmd.client,
                        json!({ "sessionId": session_id, "paid": session.paid }),
                    )
                    .await;
                Ok(SyncOnReturnResult::Payment { paid: session.paid })
            }
        }
    }
}
