//! ProcessedEventStore port - idempotency markers for provider events.
//!
//! Providers deliver webhooks at least once. A marker row for event `E`
//! means processing of `E` has started and, unless it was rolled back,
//! completed.
//!
//! Events may be delivered more than once due to:
//! - Network timeouts
//! - 5xx responses from our endpoint
//! - Our endpoint succeeding but the provider not seeing the response

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, Timestamp};

/// Result of attempting to insert a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkResult {
    /// This call created the marker and owns processing.
    Inserted,
    /// A marker already existed (ON CONFLICT DO NOTHING semantics).
    AlreadyExists,
}

#[async_trait]
pub trait ProcessedEventStore: Send + Sync {
    /// Check if a marker exists for this event id.
    async fn contains(&self, event_id: &str) -> Result<bool, DomainError>;

    /// Insert a marker under a uniqueness constraint.
    ///
    /// A concurrent second insert of the same id must return `AlreadyExists`.
    async fn try_mark(&self, event_id: &str) -> Result<MarkResult, DomainError>;

    /// Remove a marker so the event can be reprocessed.
    ///
    /// Used only when the handler for that event failed.
    async fn unmark(&self, event_id: &str) -> Result<(), DomainError>;

    /// Delete markers older than `cutoff`. Returns the number removed.
    async fn delete_before(&self, cutoff: Timestamp) -> Result<u64, DomainError>;
}
