//! Best-effort audit trail.
//!
//! Every append goes through [`redact`] first, and a failing log never fails
//! the request that produced the entry.

use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use crate::domain::audit::{AuditAction, AuditEntry, ClientContext};
use crate::domain::foundation::SubscriberId;
use crate::ports::AuditLog;
use crate::telemetry::redact;

/// Writes audit entries, swallowing storage failures.
#[derive(Clone)]
pub struct AuditTrail {
    log: Arc<dyn AuditLog>,
}

impl AuditTrail {
    pub fn new(log: Arc<dyn AuditLog>) -> Self {
        Self { log }
    }

    /// Appends one entry. Failures are logged and dropped.
    pub async fn record(
        &self,
        action: AuditAction,
        subscriber_id: Option<&SubscriberId>,
        client: &ClientContext,
        metadata: Value,
    ) {
        let entry = AuditEntry::new(action, subscriber_id.cloned(), client, redact(&metadata));
        if let Err(err) = self.log.append(entry).await {
            warn!(action = %action, error = %err, "Failed to append audit entry");
        }
    }
}

impl std::fmt::Debug for AuditTrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditTrail").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryAuditLog;
    use serde_json::json;

    #[tokio::test]
    async fn records_redacted_metadata() {
        let log = InMemoryAuditLog::new();
        let trail = AuditTrail::new(Arc::new(log.clone()));
        let id = SubscriberId::new("user-1").unwrap();

        trail
            .record(
                AuditAction::AttemptCreated,
                Some(&id),
                &ClientContext::system(),
                json!({ "attemptId": "a-1", "transcript": "my answer" }),
            )
            .await;

        let entries = log.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].subscriber_id.as_ref(), Some(&id));
        assert_eq!(entries[0].metadata["attemptId"], "a-1");
        assert_eq!(entries[0].metadata["transcript"], "[redacted]");
    }

    #[tokio::test]
    async fn storage_failure_is_swallowed() {
        let log = InMemoryAuditLog::new();
        log.set_failing(true);
        let trail = AuditTrail::new(Arc::new(log.clone()));

        trail
            .record(
                AuditAction::WebhookIgnored,
                None,
                &ClientContext::system(),
                json!({}),
            )
            .await;

        assert!(log.entries().await.is_empty());
    }
}
