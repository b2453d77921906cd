//! In-memory subscriber and attempt storage.
//!
//! One store backs both ports so that the ledger transaction sees the same
//! subscriber rows the reconciler writes. The per-subscriber lock is a real
//! async mutex held for the life of the transaction, which keeps the ledger
//! path honest under concurrent tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::domain::billing::SubscriptionFacts;
use crate::domain::entitlement::{AttemptRecord, NewAttempt, Subscriber};
use crate::domain::foundation::{AttemptId, DomainError, ErrorCode, SubscriberId, Timestamp};
use crate::ports::{AttemptStore, LedgerTransaction, SubscriberRepository};

#[derive(Default)]
struct Tables {
    subscribers: RwLock<HashMap<SubscriberId, Subscriber>>,
    attempts: RwLock<Vec<AttemptRecord>>,
    row_locks: Mutex<HashMap<SubscriberId, Arc<Mutex<()>>>>,
    /// Commits that will fail with a serialization conflict.
    pending_conflicts: AtomicU32,
    /// `apply_facts` calls that will fail with a database error.
    pending_write_failures: AtomicU32,
}

/// Process-local entitlement storage for tests and single-instance runs.
#[derive(Clone, Default)]
pub struct InMemoryEntitlementStore {
    tables: Arc<Tables>,
}

impl InMemoryEntitlementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds or replaces a subscriber row.
    pub async fn insert_subscriber(&self, subscriber: Subscriber) {
        self.tables
            .subscribers
            .write()
            .await
            .insert(subscriber.id.clone(), subscriber);
    }

    /// Every attempt row for a subscriber, deleted ones included.
    pub async fn all_attempts(&self, id: &SubscriberId) -> Vec<AttemptRecord> {
        self.tables
            .attempts
            .read()
            .await
            .iter()
            .filter(|a| &a.subscriber_id == id)
            .cloned()
            .collect()
    }

    /// Makes the next `n` ledger commits fail as serialization conflicts.
    pub fn inject_commit_conflicts(&self, n: u32) {
        self.tables.pending_conflicts.store(n, Ordering::SeqCst);
    }

    /// Makes the next `n` subscriber updates fail.
    pub fn inject_write_failures(&self, n: u32) {
        self.tables.pending_write_failures.store(n, Ordering::SeqCst);
    }

    async fn row_lock(&self, id: &SubscriberId) -> Arc<Mutex<()>> {
        self.tables
            .row_locks
            .lock()
            .await
            .entry(id.clone())
            .or_default()
            .clone()
    }

    async fn find_where<F>(&self, pred: F) -> Option<Subscriber>
    where
        F: Fn(&Subscriber) -> bool,
    {
        self.tables
            .subscribers
            .read()
            .await
            .values()
            .find(|s| pred(s))
            .cloned()
    }
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

fn count_live(attempts: &[AttemptRecord], id: &SubscriberId) -> u32 {
    attempts
        .iter()
        .filter(|a| &a.subscriber_id == id && a.deleted_at.is_none())
        .count() as u32
}

#[async_trait]
impl SubscriberRepository for InMemoryEntitlementStore {
    async fn ensure(&self, id: &SubscriberId, default_cap: u32) -> Result<Subscriber, DomainError> {
        let mut subscribers = self.tables.subscribers.write().await;
        Ok(subscribers
            .entry(id.clone())
            .or_insert_with(|| Subscriber::new(id.clone(), default_cap))
            .clone())
    }

    async fn find(&self, id: &SubscriberId) -> Result<Option<Subscriber>, DomainError> {
        Ok(self.tables.subscribers.read().await.get(id).cloned())
    }

    async fn find_by_subscription_ref(
        &self,
        subscription_ref: &str,
    ) -> Result<Option<Subscriber>, DomainError> {
        Ok(self
            .find_where(|s| s.payment_subscription_ref.as_deref() == Some(subscription_ref))
            .await)
    }

    async fn find_by_customer_ref(
        &self,
        customer_ref: &str,
    ) -> Result<Option<Subscriber>, DomainError> {
        Ok(self
            .find_where(|s| s.payment_customer_ref.as_deref() == Some(customer_ref))
            .await)
    }

    async fn apply_facts(
        &self,
        id: &SubscriberId,
        facts: &SubscriptionFacts,
    ) -> Result<Option<Subscriber>, DomainError> {
        if take_one(&self.tables.pending_write_failures) {
            return Err(DomainError::new(
                ErrorCode::DatabaseError,
                "injected subscriber write failure",
            ));
        }
        let mut subscribers = self.tables.subscribers.write().await;
        Ok(subscribers.get_mut(id).map(|subscriber| {
            facts.apply_to(subscriber);
            subscriber.clone()
        }))
    }
}

#[async_trait]
impl AttemptStore for InMemoryEntitlementStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, DomainError> {
        Ok(Box::new(MemoryLedgerTransaction {
            store: self.clone(),
            guard: None,
            pending: Vec::new(),
        }))
    }

    async fn count_active(&self, id: &SubscriberId) -> Result<u32, DomainError> {
        Ok(count_live(&self.tables.attempts.read().await, id))
    }

    async fn list_active(
        &self,
        id: &SubscriberId,
        limit: u32,
    ) -> Result<Vec<AttemptRecord>, DomainError> {
        let attempts = self.tables.attempts.read().await;
        let mut live: Vec<AttemptRecord> = attempts
            .iter()
            .filter(|a| &a.subscriber_id == id && a.deleted_at.is_none())
            .cloned()
            .collect();
        live.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        live.truncate(limit as usize);
        Ok(live)
    }

    async fn soft_delete(
        &self,
        id: &SubscriberId,
        attempt_id: &AttemptId,
    ) -> Result<bool, DomainError> {
        let mut attempts = self.tables.attempts.write().await;
        match attempts
            .iter_mut()
            .find(|a| &a.id == attempt_id && &a.subscriber_id == id && a.deleted_at.is_none())
        {
            Some(attempt) => {
                attempt.deleted_at = Some(Timestamp::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Ledger transaction holding the subscriber's row lock until it ends.
struct MemoryLedgerTransaction {
    store: InMemoryEntitlementStore,
    guard: Option<OwnedMutexGuard<()>>,
    pending: Vec<AttemptRecord>,
}

#[async_trait]
impl LedgerTransaction for MemoryLedgerTransaction {
    async fn lock_subscriber(
        &mut self,
        id: &SubscriberId,
    ) -> Result<Option<Subscriber>, DomainError> {
        if self.guard.is_none() {
            let lock = self.store.row_lock(id).await;
            self.guard = Some(lock.lock_owned().await);
        }
        self.store.find(id).await
    }

    async fn count_active(&mut self, id: &SubscriberId) -> Result<u32, DomainError> {
        let committed = count_live(&self.store.tables.attempts.read().await, id);
        Ok(committed + count_live(&self.pending, id))
    }

    async fn insert_attempt(
        &mut self,
        id: &SubscriberId,
        attempt: &NewAttempt,
    ) -> Result<AttemptId, DomainError> {
        let attempt_id = AttemptId::new();
        self.pending.push(AttemptRecord {
            id: attempt_id,
            subscriber_id: id.clone(),
            created_at: Timestamp::now(),
            occurred_at: attempt.occurred_at,
            deleted_at: None,
            payload: attempt.body.clone(),
        });
        Ok(attempt_id)
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        if take_one(&self.store.tables.pending_conflicts) {
            return Err(DomainError::new(
                ErrorCode::ConcurrencyConflict,
                "could not serialize access due to concurrent update",
            ));
        }
        let mut this = *self;
        this.store
            .tables
            .attempts
            .write()
            .await
            .append(&mut this.pending);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DomainError> {
        Ok(())
    }
}
