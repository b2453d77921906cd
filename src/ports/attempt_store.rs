//! AttemptStore port - storage behind the attempt ledger.
//!
//! Attempt creation is expressed as a transaction with explicit
//! lock / re-read / count / insert steps so that the ordering contract
//! (every read happens after the subscriber lock is held) is visible at
//! the interface instead of hidden inside an ORM call.

use async_trait::async_trait;

use crate::domain::entitlement::{AttemptRecord, NewAttempt, Subscriber};
use crate::domain::foundation::{AttemptId, DomainError, SubscriberId};

/// One open ledger transaction.
///
/// Dropping without `commit` discards every write.
#[async_trait]
pub trait LedgerTransaction: Send {
    /// Takes the exclusive per-subscriber lock and re-reads the row under it.
    ///
    /// Blocks concurrent ledger transactions for the same subscriber only.
    async fn lock_subscriber(
        &mut self,
        id: &SubscriberId,
    ) -> Result<Option<Subscriber>, DomainError>;

    /// Counts non-deleted attempts inside this transaction.
    async fn count_active(&mut self, id: &SubscriberId) -> Result<u32, DomainError>;

    async fn insert_attempt(
        &mut self,
        id: &SubscriberId,
        attempt: &NewAttempt,
    ) -> Result<AttemptId, DomainError>;

    async fn commit(self: Box<Self>) -> Result<(), DomainError>;

    async fn rollback(self: Box<Self>) -> Result<(), DomainError>;
}

#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Opens a serializable ledger transaction.
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, DomainError>;

    /// Counts non-deleted attempts outside any ledger transaction.
    async fn count_active(&self, id: &SubscriberId) -> Result<u32, DomainError>;

    /// Newest-first non-deleted attempts, at most `limit`.
    async fn list_active(
        &self,
        id: &SubscriberId,
        limit: u32,
    ) -> Result<Vec<AttemptRecord>, DomainError>;

    /// Sets `deleted_at` on an owned, not yet deleted attempt.
    ///
    /// Returns false when no such attempt exists for this subscriber.
    async fn soft_delete(
        &self,
        id: &SubscriberId,
        attempt_id: &AttemptId,
    ) -> Result<bool, DomainError>;
}
