//! API error responses.
//!
//! Every failing request answers with `{ "error": CODE, "message": ... }`.
//! Policy rejections carry extra context: the entitlement for
//! `FREE_LIMIT_REACHED`, a `Retry-After` header for `RATE_LIMITED`.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::application::{AttemptError, BillingError};
use crate::domain::billing::WebhookError;
use crate::domain::entitlement::Entitlement;

/// Error body returned by every endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error: String,
    /// Human-readable error message.
    pub message: String,
    /// Entitlement at the time of a quota rejection.
    #[serde(flatten)]
    pub entitlement: Option<Entitlement>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            entitlement: None,
        }
    }
}

/// Error type returned by HTTP handlers.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    entitlement: Option<Entitlement>,
    retry_after_secs: Option<u64>,
    policy: bool,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            entitlement: None,
            retry_after_secs: None,
            policy: false,
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
            "Authentication is required",
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl From<AttemptError> for ApiError {
    fn from(err: AttemptError) -> Self {
        let code = err.code();
        let status = match &err {
            AttemptError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AttemptError::FreeLimitReached { .. } => StatusCode::PAYMENT_REQUIRED,
            AttemptError::InvalidPayload(e) if e.is_too_large() => StatusCode::PAYLOAD_TOO_LARGE,
            AttemptError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            AttemptError::NotFound => StatusCode::NOT_FOUND,
            AttemptError::Limiter(_) | AttemptError::Domain(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let mut api = ApiError::new(status, code, err.to_string());
        api.policy = err.is_policy_rejection();
        match err {
            AttemptError::RateLimited {
                retry_after_secs, ..
            } => api.retry_after_secs = Some(retry_after_secs),
            AttemptError::FreeLimitReached { entitlement } => {
                api.entitlement = Some(Entitlement {
                    remaining: Some(0),
                    ..entitlement
                })
            }
            _ => {}
        }
        api
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        let status = match &err {
            BillingError::MissingSessionId
            | BillingError::MissingSubscription
            | BillingError::NoCustomer => StatusCode::BAD_REQUEST,
            BillingError::Forbidden => StatusCode::FORBIDDEN,
            BillingError::Provider(_) => StatusCode::BAD_GATEWAY,
            BillingError::MissingPriceId(_)
            | BillingError::SyncFailed(_)
            | BillingError::Domain(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError::new(status, err.code(), err.to_string())
    }
}

impl From<WebhookError> for ApiError {
    fn from(err: WebhookError) -> Self {
        ApiError::new(err.status_code(), err.code(), err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(code = self.code, status = %self.status, message = %self.message, "Request failed");
        } else if self.policy {
            info!(code = self.code, status = %self.status, "Request rejected by policy");
        } else {
            warn!(code = self.code, status = %self.status, message = %self.message, "Request rejected");
        }

        // Internal details stay in the logs
        let message = if self.status == StatusCode::INTERNAL_SERVER_ERROR {
            "Internal server error".to_string()
        } else {
            self.message
        };

        let body = ErrorResponse {
            error: self.code.to_string(),
            message,
            entitlement: self.entitlement,
        };
        let mut response = (self.status, Json(body)).into_response();
        if let Some(secs) = self.retry_after_secs {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
