//! Attempt payload validation and stored attempt records.
//!
//! The payload is opaque to quota accounting. Only its size is policed here,
//! before the ledger is touched.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::foundation::{AttemptId, SubscriberId, Timestamp};

pub const MAX_QUESTION_CHARS: usize = 600;
pub const MAX_TRANSCRIPT_CHARS: usize = 8_000;
pub const MAX_JOB_DESC_CHARS: usize = 12_000;

/// How the transcript was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMethod {
    Spoken,
    Pasted,
}

/// Client-submitted attempt body, prior to validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptPayload {
    /// Client-side capture time in Unix milliseconds.
    pub ts: Option<f64>,
    pub question: Option<String>,
    pub transcript: Option<String>,
    pub input_method: Option<InputMethod>,
    pub wpm: Option<f64>,
    pub prosody: Option<Value>,
    pub feedback: Option<Value>,
    pub score: Option<f64>,
    pub communication_score: Option<f64>,
    pub confidence_score: Option<f64>,
    pub focus_goal: Option<String>,
    pub job_desc: Option<String>,
    pub audio_id: Option<String>,
    pub duration_seconds: Option<f64>,
}

/// Why an attempt payload was refused before reaching the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("Malformed attempt body: {0}")]
    Malformed(String),

    #[error("Missing or invalid field '{0}'")]
    Missing(&'static str),

    #[error("Question exceeds 600 characters")]
    QuestionTooLong,

    #[error("Transcript exceeds 8000 characters")]
    TranscriptTooLong,

    #[error("Job description exceeds 12000 characters")]
    JobDescTooLong,
}

impl PayloadError {
    /// Machine-readable code surfaced to clients.
    pub fn code(&self) -> &'static str {
        match self {
            PayloadError::Malformed(_) | PayloadError::Missing(_) => "BAD_REQUEST",
            PayloadError::QuestionTooLong => "QUESTION_TOO_LONG",
            PayloadError::TranscriptTooLong => "TRANSCRIPT_TOO_LONG",
            PayloadError::JobDescTooLong => "JOBDESC_TOO_LONG",
        }
    }

    /// True for size violations, which map to 413 rather than 400.
    pub fn is_too_large(&self) -> bool {
        !matches!(self, PayloadError::Malformed(_) | PayloadError::Missing(_))
    }
}

/// A validated attempt ready for the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAttempt {
    pub occurred_at: Timestamp,
    /// Normalised payload persisted as-is.
    pub body: Value,
}

impl AttemptPayload {
    /// Decodes a raw request body. Any JSON or type mismatch is `Malformed`.
    pub fn from_json(body: &[u8]) -> Result<Self, PayloadError> {
        serde_json::from_slice(body).map_err(|e| PayloadError::Malformed(e.to_string()))
    }

    /// Checks required fields and size limits, normalising numeric scores.
    pub fn validate(mut self) -> Result<NewAttempt, PayloadError> {
        let occurred_at = self
            .ts
            .filter(|ts| ts.is_finite())
            .and_then(|ts| Timestamp::from_unix_millis(ts as i64))
            .ok_or(PayloadError::Missing("ts"))?;

        let question = non_blank(self.question.as_deref()).ok_or(PayloadError::Missing("question"))?;
        let transcript =
            non_blank(self.transcript.as_deref()).ok_or(PayloadError::Missing("transcript"))?;

        if question.chars().count() > MAX_QUESTION_CHARS {
            return Err(PayloadError::QuestionTooLong);
        }
        if transcript.chars().count() > MAX_TRANSCRIPT_CHARS {
            return Err(PayloadError::TranscriptTooLong);
        }
        if let Some(job_desc) = &self.job_desc {
            if job_desc.chars().count() > MAX_JOB_DESC_CHARS {
                return Err(PayloadError::JobDescTooLong);
            }
        }

        self.wpm = self.wpm.map(f64::round);
        self.score = self.score.map(f64::round);
        self.communication_score = self.communication_score.map(f64::round);
        self.confidence_score = self.confidence_score.map(f64::round);

        let body = serde_json::to_value(&self).map_err(|_| PayloadError::Missing("payload"))?;
        Ok(NewAttempt { occurred_at, body })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// A stored attempt as returned by listings.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRecord {
    pub id: AttemptId,
    pub subscriber_id: SubscriberId,
    pub created_at: Timestamp,
    pub occurred_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
    pub payload: Value,
}

impl AttemptRecord {
    /// Explicit score, falling back to the score embedded in feedback.
    pub fn score(&self) -> Option<f64> {
        self.payload
            .get("score")
            .and_then(Value::as_f64)
            .or_else(|| {
                self.payload
                    .get("feedback")
                    .and_then(|f| f.get("score"))
                    .and_then(Value::as_f64)
            })
    }
}
