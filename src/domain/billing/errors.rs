//! Webhook error types.
//!
//! Defines the error conditions of webhook ingestion, with HTTP status
//! mapping that drives the provider's retry behaviour.

use http::StatusCode;
use thiserror::Error;

/// Errors that occur while verifying, interpreting or applying a provider event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookError {
    /// Webhook signature verification failed.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Webhook timestamp is outside the acceptable window (5 minutes).
    #[error("Timestamp out of range")]
    TimestampOutOfRange,

    /// Event timestamp is in the future beyond clock skew tolerance.
    #[error("Invalid timestamp")]
    InvalidTimestamp,

    /// Failed to parse webhook payload or signature header.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Required field missing from the event object.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// Idempotency or subscriber store failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Follow-up call to the payment provider failed.
    #[error("Provider error: {0}")]
    Provider(String),
}

impl WebhookError {
    /// Returns true if the provider should retry delivering this webhook.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WebhookError::Storage(_) | WebhookError::Provider(_))
    }

    /// Maps the error to an HTTP status code.
    ///
    /// - 2xx: acknowledged, no retry
    /// - 4xx: rejected, no retry
    /// - 5xx: provider retries
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::InvalidSignature | WebhookError::TimestampOutOfRange => {
                StatusCode::UNAUTHORIZED
            }
            WebhookError::InvalidTimestamp
            | WebhookError::ParseError(_)
            | WebhookError::MissingField(_) => StatusCode::BAD_REQUEST,
            WebhookError::Storage(_) | WebhookError::Provider(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Machine-readable code for response bodies and audit metadata.
    pub fn code(&self) -> &'static str {
        match self {
            WebhookError::InvalidSignature => "INVALID_SIGNATURE",
            WebhookError::TimestampOutOfRange | WebhookError::InvalidTimestamp => {
                "INVALID_TIMESTAMP"
            }
            WebhookError::ParseError(_) => "INVALID_PAYLOAD",
            WebhookError::MissingField(_) => "MISSING_FIELD",
            WebhookError::Storage(_) => "STORAGE_ERROR",
            WebhookError::Provider(_) => "PROVIDER_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_failures_are_unauthorized_and_final() {
        for err in [WebhookError::InvalidSignature, WebhookError::TimestampOutOfRange] {
            assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn malformed_payloads_are_bad_requests() {
        assert_eq!(
            WebhookError::MissingField("data.object.id").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WebhookError::ParseError("eof".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn infrastructure_failures_ask_for_retry() {
        let err = WebhookError::Storage("pool timed out".into());
        assert!(err.is_retryable());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(format!("{}", err), "Storage error: pool timed out");
    }
}
