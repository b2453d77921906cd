//! Billing handler errors.

use thiserror::Error;

use crate::domain::foundation::DomainError;
use crate::ports::PaymentError;

/// Failures of the caller-initiated billing commands.
///
/// Webhook ingestion reports through `WebhookError` and `EventOutcome`
/// instead, since its caller is the provider.
#[derive(Debug, Clone, Error)]
pub enum BillingError {
    #[error("Missing session_id")]
    MissingSessionId,

    #[error("Checkout session belongs to another subscriber")]
    Forbidden,

    #[error("Checkout session has no subscription")]
    MissingSubscription,

    #[error("No price configured for checkout mode {0}")]
    MissingPriceId(&'static str),

    #[error("Subscriber has no billing customer")]
    NoCustomer,

    #[error("Sync failed: {0}")]
    SyncFailed(String),

    #[error(transparent)]
    Provider(#[from] PaymentError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl BillingError {
    /// Machine-readable code surfaced to clients.
    pub fn code(&self) -> &'static str {
        match self {
            BillingError::MissingSessionId => "MISSING_SESSION_ID",
            BillingError::Forbidden => "FORBIDDEN",
            BillingError::MissingSubscription => "MISSING_SUBSCRIPTION",
            BillingError::MissingPriceId(_) => "MISSING_PRICE_ID",
            BillingError::NoCustomer => "NO_CUSTOMER",
            BillingError::SyncFailed(_) => "SYNC_FAILED",
            BillingError::Provider(_) => "PAYMENT_PROVIDER_ERROR",
            BillingError::Domain(_) => "INTERNAL_ERROR",
        }
    }
}
