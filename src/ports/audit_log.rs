//! AuditLog port - append-only record of entitlement decisions.

use async_trait::async_trait;

use crate::domain::audit::AuditEntry;
use crate::domain::foundation::DomainError;

#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Appends one entry. Entries are never updated or deleted.
    async fn append(&self, entry: AuditEntry) -> Result<(), DomainError>;
}
