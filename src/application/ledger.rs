//! Attempt ledger: the only write path for attempts.
//!
//! Each creation runs lock, re-read, decide, write inside one store
//! transaction. The subscriber row lock is held from `lock_subscriber` until
//! commit or rollback, so two requests for the same subscriber at the cap
//! boundary cannot both see room. Nothing outside the store is awaited while
//! the lock is held.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::entitlement::{Entitlement, GracePolicy, NewAttempt};
use crate::domain::foundation::{AttemptId, DomainError, ErrorCode, SubscriberId, Timestamp};
use crate::ports::{AttemptStore, LedgerTransaction};

/// Serialization conflicts retried before giving up.
const MAX_CONFLICT_RETRIES: u32 = 3;

/// Result of one ledger decision.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerOutcome {
    /// Row written. The entitlement was computed inside the same transaction.
    Created {
        id: AttemptId,
        entitlement: Entitlement,
    },
    /// Free cap exhausted; nothing written.
    Rejected { entitlement: Entitlement },
}

/// Transactional attempt creation.
#[derive(Clone)]
pub struct AttemptLedger {
    store: Arc<dyn AttemptStore>,
    policy: GracePolicy,
}

impl AttemptLedger {
    pub fn new(store: Arc<dyn AttemptStore>, policy: GracePolicy) -> Self {
        Self { store, policy }
    }

    /// Creates an attempt if the subscriber is entitled to one.
    ///
    /// The subscriber row must already exist.
    ///
    /// # Errors
    ///
    /// - `SubscriberNotFound` if there is no row to lock
    /// - `ConcurrencyConflict` if every retry lost a serialization conflict
    /// - `DatabaseError` for store failures
    pub async fn create(
        &self,
        subscriber_id: &SubscriberId,
        attempt: &NewAttempt,
    ) -> Result<LedgerOutcome, DomainError> {
        let mut retries = 0;
        loop {
            match self.run_once(subscriber_id, attempt).await {
                Err(err)
                    if err.code == ErrorCode::ConcurrencyConflict
                        && retries < MAX_CONFLICT_RETRIES =>
                {
                    retries += 1;
                    debug!(
                        subscriber_id = %subscriber_id,
                        retry = retries,
                        "Ledger transaction conflicted, retrying"
                    );
                }
                result => return result,
            }
        }
    }

    async fn run_once(
        &self,
        subscriber_id: &SubscriberId,
        attempt: &NewAttempt,
    ) -> Result<LedgerOutcome, DomainError> {
        let mut tx = self.store.begin().await?;

        match self.decide_and_write(tx.as_mut(), subscriber_id, attempt).await {
            Ok(outcome @ LedgerOutcome::Created { .. }) => {
                tx.commit().await?;
                Ok(outcome)
            }
            Ok(outcome @ LedgerOutcome::Rejected { .. }) => {
                tx.rollback().await?;
                Ok(outcome)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Ledger rollback failed");
                }
                Err(err)
            }
        }
    }

    async fn decide_and_write(
        &self,
        tx: &mut dyn LedgerTransaction,
        subscriber_id: &SubscriberId,
        attempt: &NewAttempt,
    ) -> Result<LedgerOutcome, DomainError> {
        // Billing fields must come from the locked row, not an earlier read.
        let subscriber = tx.lock_subscriber(subscriber_id).await?.ok_or_else(|| {
            DomainError::new(
                ErrorCode::SubscriberNotFound,
                format!("Subscriber {} not found", subscriber_id),
            )
        })?;

        if self.policy.is_pro_subscriber(&subscriber, Timestamp::now()) {
            let id = tx.insert_attempt(subscriber_id, attempt).await?;
            return Ok(LedgerOutcome::Created {
                id,
                entitlement: Entitlement::pro(),
            });
        }

        let cap = subscriber.free_attempt_cap;
        let used = tx.count_active(subscriber_id).await?;
        if used >= cap {
            return Ok(LedgerOutcome::Rejected {
                entitlement: Entitlement::free(cap, used),
            });
        }

        let id = tx.insert_attempt(subscriber_id, attempt).await?;
        let used = tx.count_active(subscriber_id).await?;
        Ok(LedgerOutcome::Created {
            id,
            entitlement: Entitlement::free(cap, used),
        })
    }
}

impl std::fmt::Debug for AttemptLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttemptLedger")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
