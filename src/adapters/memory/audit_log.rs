//! In-memory audit trail.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::audit::{AuditAction, AuditEntry};
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::AuditLog;

/// Append-only entry list with assertion helpers.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAuditLog {
    entries: Arc<RwLock<Vec<AuditEntry>>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every append fails.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().await.clone()
    }

    pub async fn actions(&self) -> Vec<AuditAction> {
        self.entries.read().await.iter().map(|e| e.action).collect()
    }

    pub async fn with_action(&self, action: AuditAction) -> Vec<AuditEntry> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| e.action == action)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn append(&self, entry: AuditEntry) -> Result<(), DomainError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DomainError::new(
                ErrorCode::DatabaseError,
                "audit log unavailable",
            ));
        }
        self.entries.write().await.push(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audit::ClientContext;
    use serde_json::json;

    #[tokio::test]
    async fn appends_in_order_and_filters_by_action() {
        let log = InMemoryAuditLog::new();
        let ctx = ClientContext::system();
        log.append(AuditEntry::new(AuditAction::WebhookProcessed, None, &ctx, json!({})))
            .await
            .unwrap();
        log.append(AuditEntry::new(AuditAction::WebhookDuplicate, None, &ctx, json!({})))
            .await
            .unwrap();

        assert_eq!(
            log.actions().await,
            vec![AuditAction::WebhookProcessed, AuditAction::WebhookDuplicate]
        );
        assert_eq!(log.with_action(AuditAction::WebhookDuplicate).await.len(), 1);
    }

    #[tokio::test]
    async fn failing_log_rejects_appends() {
        let log = InMemoryAuditLog::new();
        log.set_failing(true);
        let entry = AuditEntry::new(AuditAction::SyncFallback, None, &ClientContext::system(), json!({}));
        assert!(log.append(entry).await.is_err());
        assert!(log.entries().await.is_empty());
    }
}
