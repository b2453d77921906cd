//! FallbackSyncHandler - Best-effort reconciliation without a session.
//!
//! Used when a webhook was lost and the caller has nothing pending. Reads the
//! customer's newest subscription under a bounded timeout; every failure is
//! reported as "not synced" rather than as an error.

use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::application::AuditTrail;
use crate::domain::audit::{AuditAction, ClientContext};
use crate::domain::billing::SubscriptionFacts;
use crate::domain::entitlement::SubscriptionStatus;
use crate::domain::foundation::SubscriberId;
use crate::ports::{PaymentProvider, SubscriberRepository};

use super::Reconciler;

/// Command for a fallback sync of the caller.
#[derive(Debug, Clone)]
pub struct FallbackSyncCommand {
    pub subscriber_id: SubscriberId,
    pub client: ClientContext,
}

/// Why a fallback sync did not apply anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotSyncedReason {
    NoCustomer,
    NoSubscription,
    Timeout,
    ProviderError,
    StoreError,
}

/// Outcome reported to the caller, always with HTTP 200.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FallbackSyncResult {
    Synced {
        synced: bool,
        status: SubscriptionStatus,
    },
    NotSynced {
        synced: bool,
        reason: NotSyncedReason,
    },
}

impl FallbackSyncResult {
    fn synced(status: SubscriptionStatus) -> Self {
        FallbackSyncResult::Synced {
            synced: true,
            status,
        }
    }

    fn not_synced(reason: NotSyncedReason) -> Self {
        FallbackSyncResult::NotSynced {
            synced: false,
            reason,
        }
    }

    pub fn is_synced(&self) -> bool {
        matches!(self, FallbackSyncResult::Synced { .. })
    }
}

/// Handler for manual fallback sync.
pub struct FallbackSyncHandler {
    subscribers: Arc<dyn SubscriberRepository>,
    provider: Arc<dyn PaymentProvider>,
    reconciler: Reconciler,
    audit: AuditTrail,
    timeout: Duration,
    default_cap: u32,
}

impl FallbackSyncHandler {
    pub fn new(
        subscribers: Arc<dyn SubscriberRepository>,
        provider: Arc<dyn PaymentProvider>,
        reconciler: Reconciler,
        audit: AuditTrail,
        timeout: Duration,
        default_cap: u32,
    ) -> Self {
        Self {
            subscribers,
            provider,
            reconciler,
            audit,
            timeout,
            default_cap,
        }
    }

    pub async fn handle(&self, cmd: FallbackSyncCommand) -> FallbackSyncResult {
        let id = &cmd.subscriber_id;

        let subscriber = match self.subscribers.ensure(id, self.default_cap).await {
            Ok(subscriber) => subscriber,
            Err(err) => {
                warn!(subscriber_id = %id, error = %err, "Fallback sync could not read subscriber");
                return FallbackSyncResult::not_synced(NotSyncedReason::StoreError);
            }
        };
        let customer_ref = match subscriber.payment_customer_ref {
            Some(customer_ref) => customer_ref,
            None => return FallbackSyncResult::not_synced(NotSyncedReason::NoCustomer),
        };

        let lookup = tokio::time::timeout(
            self.timeout,
            self.provider.latest_subscription(&customer_ref),
        )
        .await;
        let subscription = match lookup {
            Err(_) => {
                warn!(subscriber_id = %id, timeout_ms = self.timeout.as_millis() as u64, "Fallback sync timed out");
                return FallbackSyncResult::not_synced(NotSyncedReason::Timeout);
            }
            Ok(Err(err)) => {
                warn!(subscriber_id = %id, error = %err, "Fallback sync provider call failed");
                return FallbackSyncResult::not_synced(NotSyncedReason::ProviderError);
            }
            Ok(Ok(None)) => {
                return FallbackSyncResult::not_synced(NotSyncedReason::NoSubscription)
            }
            Ok(Ok(Some(subscription))) => subscription,
        };

        let facts = SubscriptionFacts::from_subscription(&subscription).customer(Some(customer_ref));
        let status = match self.reconciler.apply_for(id, &facts).await {
            Ok(subscriber) => subscriber.subscription_status,
            Err(err) => {
                warn!(subscriber_id = %id, error = %err, "Fallback sync could not store facts");
                return FallbackSyncResult::not_synced(NotSyncedReason::StoreError);
            }
        };

        info!(subscriber_id = %id, status = %status, "Fallback sync applied provider state");
        self.audit
            .record(
                AuditAction::SyncFallback,
                Some(id),
                &cmd.client,
                json!({ "subscriptionRef": subscription.id, "status": status.as_str() }),
            )
            .await;
        FallbackSyncResult::synced(status)
    }
}
