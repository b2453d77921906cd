//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, timestamps and error types shared by the
//! entitlement, billing and audit domains.

mod errors;
mod ids;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{AttemptId, SubscriberId};
pub use timestamp::Timestamp;
