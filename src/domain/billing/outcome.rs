//! Result of offering one provider event to the idempotent processor.

use crate::domain::foundation::SubscriberId;

/// What happened to a delivered event.
///
/// Distinguishes "nothing happened" from "already happened" from
/// "will be retried" so the webhook adapter can answer the provider
/// correctly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// First delivery; facts were applied. `subscriber` is `None` when no
    /// stored subscriber matched the event.
    Processed { subscriber: Option<SubscriberId> },

    /// First delivery of an event type that carries nothing to apply.
    Ignored { event_type: String },

    /// Marker already present; no handler ran.
    Duplicate,

    /// Handler failed and the marker was removed so a retry reprocesses it.
    FailedAndRolledBack { reason: String },
}

impl EventOutcome {
    /// Whether the provider should be told to retry.
    pub fn should_retry(&self) -> bool {
        matches!(self, EventOutcome::FailedAndRolledBack { .. })
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, EventOutcome::Duplicate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_rolled_back_events_request_retry() {
        assert!(EventOutcome::FailedAndRolledBack {
            reason: "db down".into()
        }
        .should_retry());
        assert!(!EventOutcome::Duplicate.should_retry());
        assert!(!EventOutcome::Ignored {
            event_type: "customer.created".into()
        }
        .should_retry());
        assert!(!EventOutcome::Processed { subscriber: None }.should_retry());
    }
}
