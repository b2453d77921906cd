//! Payment provider port - outbound calls to the billing provider.
//!
//! Webhook verification lives in the billing domain; this port covers the
//! synchronous API calls used by return-URL sync, fallback sync, invoice
//! period lookups and hosted checkout/portal creation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::billing::{
    CheckoutMode, CheckoutSessionSnapshot, ProviderInvoice, ProviderSubscription,
};
use crate::domain::foundation::{DomainError, ErrorCode, SubscriberId};

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a customer tagged with the subscriber id. Returns the customer ref.
    async fn create_customer(&self, subscriber_id: &SubscriberId) -> Result<String, PaymentError>;

    /// Create a hosted checkout session.
    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError>;

    /// Create a billing-portal session for an existing customer.
    async fn create_portal_session(
        &self,
        customer_ref: &str,
        return_url: &str,
    ) -> Result<PortalSession, PaymentError>;

    /// Retrieve a checkout session with its subscription expanded.
    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSessionSnapshot, PaymentError>;

    /// Retrieve a subscription by provider id.
    async fn retrieve_subscription(
        &self,
        subscription_ref: &str,
    ) -> Result<Option<ProviderSubscription>, PaymentError>;

    /// Retrieve an invoice with its line prices expanded.
    async fn retrieve_invoice(
        &self,
        invoice_id: &str,
    ) -> Result<Option<ProviderInvoice>, PaymentError>;

    /// Most recently created subscription of a customer, any status.
    async fn latest_subscription(
        &self,
        customer_ref: &str,
    ) -> Result<Option<ProviderSubscription>, PaymentError>;
}

/// Request to create a hosted checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCheckoutRequest {
    pub subscriber_id: SubscriberId,
    pub customer_ref: String,
    pub mode: CheckoutMode,
    pub price_ref: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalSession {
    pub id: String,
    pub url: String,
}

/// Payment provider error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentError {
    /// Error code for categorization.
    pub code: PaymentErrorCode,

    /// Human-readable message.
    pub message: String,

    /// Provider's error code (if available).
    pub provider_code: Option<String>,
}

impl PaymentError {
    pub fn new(code: PaymentErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
        }
    }

    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::NetworkError, message)
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new(PaymentErrorCode::NotFound, format!("{} not found", resource))
    }

    pub fn timeout(operation: &str) -> Self {
        Self::new(
            PaymentErrorCode::Timeout,
            format!("{} timed out", operation),
        )
    }

    /// Whether the same call may succeed later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.code,
            PaymentErrorCode::NetworkError
                | PaymentErrorCode::Timeout
                | PaymentErrorCode::RateLimitExceeded
        )
    }
}

impl std::fmt::Display for PaymentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for PaymentError {}

impl From<PaymentError> for DomainError {
    fn from(err: PaymentError) -> Self {
        DomainError::new(ErrorCode::PaymentProviderError, err.to_string())
    }
}

/// Payment error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentErrorCode {
    NetworkError,
    Timeout,
    AuthenticationError,
    NotFound,
    RateLimitExceeded,
    InvalidResponse,
    ProviderError,
}

impl PaymentErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentErrorCode::NetworkError => "network_error",
            PaymentErrorCode::Timeout => "timeout",
            PaymentErrorCode::AuthenticationError => "authentication_error",
            PaymentErrorCode::NotFound => "not_found",
            PaymentErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            PaymentErrorCode::InvalidResponse => "invalid_response",
            PaymentErrorCode::ProviderError => "provider_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_codes_are_retryable() {
        assert!(PaymentError::network("reset").is_retryable());
        assert!(PaymentError::timeout("list subscriptions").is_retryable());
        assert!(!PaymentError::not_found("Checkout session").is_retryable());
    }

    #[test]
    fn display_includes_code() {
        let err = PaymentError::not_found("Subscription").with_provider_code("resource_missing");
        assert_eq!(format!("{}", err), "not_found: Subscription not found");
        assert_eq!(err.provider_code.as_deref(), Some("resource_missing"));
    }

    #[test]
    fn converts_to_domain_error() {
        let err: DomainError = PaymentError::network("dns").into();
        assert_eq!(err.code, ErrorCode::PaymentProviderError);
    }
}
