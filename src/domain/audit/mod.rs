//! Audit domain.
//!
//! Every entitlement-relevant decision is recorded as one append-only entry.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::domain::foundation::{SubscriberId, Timestamp};

/// Enumerated audit action tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditAction {
    #[serde(rename = "attempt.created")]
    AttemptCreated,
    #[serde(rename = "attempt.blocked_free_cap")]
    AttemptBlockedFreeCap,
    #[serde(rename = "attempt.rate_limited")]
    AttemptRateLimited,
    #[serde(rename = "attempt.deleted")]
    AttemptDeleted,
    #[serde(rename = "billing.webhook_processed")]
    WebhookProcessed,
    #[serde(rename = "billing.webhook_duplicate")]
    WebhookDuplicate,
    #[serde(rename = "billing.webhook_error")]
    WebhookError,
    #[serde(rename = "billing.webhook_ignored")]
    WebhookIgnored,
    #[serde(rename = "billing.invoice_payment_failed")]
    InvoicePaymentFailed,
    #[serde(rename = "billing.sync_subscription")]
    SyncSubscription,
    #[serde(rename = "billing.sync_payment")]
    SyncPayment,
    #[serde(rename = "billing.sync_fallback")]
    SyncFallback,
    #[serde(rename = "billing.checkout_started")]
    CheckoutStarted,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::AttemptCreated => "attempt.created",
            AuditAction::AttemptBlockedFreeCap => "attempt.blocked_free_cap",
            AuditAction::AttemptRateLimited => "attempt.rate_limited",
            AuditAction::AttemptDeleted => "attempt.deleted",
            AuditAction::WebhookProcessed => "billing.webhook_processed",
            AuditAction::WebhookDuplicate => "billing.webhook_duplicate",
            AuditAction::WebhookError => "billing.webhook_error",
            AuditAction::WebhookIgnored => "billing.webhook_ignored",
            AuditAction::InvoicePaymentFailed => "billing.invoice_payment_failed",
            AuditAction::SyncSubscription => "billing.sync_subscription",
            AuditAction::SyncPayment => "billing.sync_payment",
            AuditAction::SyncFallback => "billing.sync_fallback",
            AuditAction::CheckoutStarted => "billing.checkout_started",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request origin recorded alongside an audit entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientContext {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientContext {
    /// Context for provider-initiated calls with no browser behind them.
    pub fn system() -> Self {
        Self::default()
    }
}

/// One append-only audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub subscriber_id: Option<SubscriberId>,
    pub action: AuditAction,
    pub created_at: Timestamp,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub metadata: Value,
}

impl AuditEntry {
    pub fn new(
        action: AuditAction,
        subscriber_id: Option<SubscriberId>,
        client: &ClientContext,
        metadata: Value,
    ) -> Self {
        Self {
            subscriber_id,
            action,
            created_at: Timestamp::now(),
            ip: client.ip.clone(),
            user_agent: client.user_agent.clone(),
            metadata,
        }
    }
}
