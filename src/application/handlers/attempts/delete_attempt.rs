//! DeleteAttemptHandler - Command handler for soft-deleting an attempt.
//!
//! Soft-deleted attempts stop counting against the free cap.

use serde_json::json;
use std::sync::Arc;

use crate::application::AuditTrail;
use crate::domain::audit::{AuditAction, ClientContext};
use crate::domain::foundation::{AttemptId, SubscriberId};
use crate::ports::AttemptStore;

use super::AttemptError;

/// Command to soft-delete one of the caller's attempts.
#[derive(Debug, Clone)]
pub struct DeleteAttemptCommand {
    pub subscriber_id: SubscriberId,
    pub attempt_id: AttemptId,
    pub client: ClientContext,
}

/// Handler for soft deletes.
pub struct DeleteAttemptHandler {
    attempts: Arc<dyn AttemptStore>,
    audit: AuditTrail,
}

impl DeleteAttemptHandler {
    pub fn new(attempts: Arc<dyn AttemptStore>, audit: AuditTrail) -> Self {
        Self { attempts, audit }
    }

    /// # Errors
    ///
    /// `NotFound` if the attempt does not exist, belongs to someone else, or
    /// was already deleted.
    pub async fn handle(&self, cmd: DeleteAttemptCommand) -> Result<(), AttemptError> {
        let deleted = self
            .attempts
            .soft_delete(&cmd.subscriber_id, &cmd.attempt_id)
            .await?;
        if !deleted {
            return Err(AttemptError::NotFound);
        }

        self.audit
            .record(
                AuditAction::AttemptDeleted,
                Some(&cmd.subscriber_id),
                &cmd.client,
                json!({ "attemptId": cmd.attempt_id.to_string() }),
            )
            .await;
        Ok(())
    }
}
