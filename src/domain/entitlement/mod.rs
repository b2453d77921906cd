//! Entitlement domain.
//!
//! Subscriber billing state, the pure entitlement rules, and the shape of
//! metered attempts.

mod attempt;
mod entitlement;
mod status;
mod subscriber;

pub use attempt::{
    AttemptPayload, AttemptRecord, InputMethod, NewAttempt, PayloadError, MAX_JOB_DESC_CHARS,
    MAX_QUESTION_CHARS, MAX_TRANSCRIPT_CHARS,
};
pub use entitlement::{compute, DenialReason, Entitlement, GracePolicy};
pub use status::SubscriptionStatus;
pub use subscriber::{Subscriber, DEFAULT_FREE_ATTEMPT_CAP};
