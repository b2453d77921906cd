//! HTTP DTOs for billing endpoints.

use serde::{Deserialize, Serialize};

use crate::application::SyncOnReturnResult;
use crate::domain::billing::{CheckoutMode, EventOutcome};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Query string of the return-URL sync.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncParams {
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Body of a checkout request. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutRequest {
    /// `subscription` (default) or `payment`.
    #[serde(default)]
    pub mode: Option<String>,
}

impl CheckoutRequest {
    /// Parses a body leniently: an empty or malformed body means defaults.
    pub fn from_body(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_default()
    }

    pub fn checkout_mode(&self) -> CheckoutMode {
        match self.mode.as_deref() {
            Some("payment") => CheckoutMode::Payment,
            _ => CheckoutMode::Subscription,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Acknowledgement sent back to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub duplicate: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub ignored: bool,
}

impl WebhookAck {
    /// Acknowledgement for outcomes that must not trigger a provider retry.
    pub fn for_outcome(outcome: &EventOutcome) -> Option<Self> {
        let ack = |duplicate, ignored| WebhookAck {
            received: true,
            duplicate,
            ignored,
        };
        match outcome {
            EventOutcome::Processed { .. } => Some(ack(false, false)),
            EventOutcome::Ignored { .. } => Some(ack(false, true)),
            EventOutcome::Duplicate => Some(ack(true, false)),
            EventOutcome::FailedAndRolledBack { .. } => None,
        }
    }
}

/// Result of the return-URL sync.
#[derive(Debug, Clone, Serialize)]
pub struct SyncResponse {
    pub ok: bool,
    #[serde(flatten)]
    pub result: SyncOnReturnResult,
}

impl From<SyncOnReturnResult> for SyncResponse {
    fn from(result: SyncOnReturnResult) -> Self {
        Self { ok: true, result }
    }
}

/// Hosted page the browser should be sent to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedirectResponse {
    pub url: String,
}
