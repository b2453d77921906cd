//! HTTP DTOs for entitlement and attempt endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::application::{CreateAttemptResult, ListAttemptsResult};
use crate::domain::entitlement::{AttemptRecord, Entitlement};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Query string for attempt listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListAttemptsParams {
    /// Page size; defaults to 50 and is clamped to 1..=200.
    #[serde(default)]
    pub limit: Option<u32>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Entitlement for the signed-in subscriber.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementResponse {
    pub is_authed: bool,
    #[serde(flatten)]
    pub entitlement: Entitlement,
}

impl From<Entitlement> for EntitlementResponse {
    fn from(entitlement: Entitlement) -> Self {
        Self {
            is_authed: true,
            entitlement,
        }
    }
}

/// One stored attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptResponse {
    pub id: String,
    /// Client-reported time of the attempt, ms epoch.
    pub ts: i64,
    /// Server-side insertion time, ms epoch.
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub payload: Value,
}

impl From<AttemptRecord> for AttemptResponse {
    fn from(record: AttemptRecord) -> Self {
        Self {
            id: record.id.to_string(),
            ts: record.occurred_at.as_unix_millis(),
            created_at: record.created_at.as_unix_millis(),
            score: record.score(),
            payload: record.payload,
        }
    }
}

/// Newest-first attempts plus the current entitlement.
#[derive(Debug, Clone, Serialize)]
pub struct ListAttemptsResponse {
    pub attempts: Vec<AttemptResponse>,
    pub entitlement: Entitlement,
}

impl From<ListAttemptsResult> for ListAttemptsResponse {
    fn from(result: ListAttemptsResult) -> Self {
        Self {
            attempts: result.attempts.into_iter().map(AttemptResponse::from).collect(),
            entitlement: result.entitlement,
        }
    }
}

/// Response for a newly recorded attempt.
#[derive(Debug, Clone, Serialize)]
pub struct CreateAttemptResponse {
    pub ok: bool,
    pub id: String,
    pub entitlement: Entitlement,
}

impl From<CreateAttemptResult> for CreateAttemptResponse {
    fn from(result: CreateAttemptResult) -> Self {
        Self {
            ok: true,
            id: result.id.to_string(),
            entitlement: result.entitlement,
        }
    }
}
