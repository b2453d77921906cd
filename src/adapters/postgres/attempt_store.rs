//! PostgreSQL implementation of AttemptStore and the ledger transaction.
//!
//! The ledger runs under SERIALIZABLE isolation and takes the subscriber row
//! with `SELECT ... FOR UPDATE`, so concurrent creations for one subscriber
//! queue behind each other while other subscribers proceed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::entitlement::{AttemptRecord, NewAttempt, Subscriber};
use crate::domain::foundation::{AttemptId, DomainError, ErrorCode, SubscriberId, Timestamp};
use crate::ports::{AttemptStore, LedgerTransaction};

use super::errors::db_error;
use super::subscriber_repository::{SubscriberRow, SUBSCRIBER_COLUMNS};

/// Attempt rows in the `attempts` table.
pub struct PostgresAttemptStore {
    pool: PgPool,
}

impl PostgresAttemptStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of an attempt.
#[derive(Debug, sqlx::FromRow)]
struct AttemptRow {
    id: Uuid,
    subscriber_id: String,
    created_at: DateTime<Utc>,
    occurred_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
    payload: Value,
}

impl TryFrom<AttemptRow> for AttemptRecord {
    type Error = DomainError;

    fn try_from(row: AttemptRow) -> Result<Self, Self::Error> {
        Ok(AttemptRecord {
            id: AttemptId::from_uuid(row.id),
            subscriber_id: SubscriberId::new(row.subscriber_id).map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Invalid subscriber id: {}", e))
            })?,
            created_at: Timestamp::from_datetime(row.created_at),
            occurred_at: Timestamp::from_datetime(row.occurred_at),
            deleted_at: row.deleted_at.map(Timestamp::from_datetime),
            payload: row.payload,
        })
    }
}

fn to_count(n: i64) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

const COUNT_ACTIVE_SQL: &str =
    "SELECT COUNT(*) FROM attempts WHERE subscriber_id = $1 AND deleted_at IS NULL";

#[async_trait]
impl AttemptStore for PostgresAttemptStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin ledger transaction", e))?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("Failed to set isolation level", e))?;
        Ok(Box::new(PostgresLedgerTransaction { tx }))
    }

    async fn count_active(&self, id: &SubscriberId) -> Result<u32, DomainError> {
        let n: i64 = sqlx::query_scalar(COUNT_ACTIVE_SQL)
            .bind(id.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("Failed to count attempts", e))?;
        Ok(to_count(n))
    }

    async fn list_active(
        &self,
        id: &SubscriberId,
        limit: u32,
    ) -> Result<Vec<AttemptRecord>, DomainError> {
        let rows: Vec<AttemptRow> = sqlx::query_as(
            r#"
            SELECT id, subscriber_id, created_at, occurred_at, deleted_at, payload
            FROM attempts
            WHERE subscriber_id = $1 AND deleted_at IS NULL
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(id.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list attempts", e))?;

        rows.into_iter().map(AttemptRecord::try_from).collect()
    }

    async fn soft_delete(
        &self,
        id: &SubscriberId,
        attempt_id: &AttemptId,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE attempts SET deleted_at = now()
            WHERE id = $1 AND subscriber_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(attempt_id.as_uuid())
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to delete attempt", e))?;

        Ok(result.rows_affected() == 1)
    }
}

/// One SERIALIZABLE transaction over the ledger tables.
struct PostgresLedgerTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTransaction for PostgresLedgerTransaction {
    async fn lock_subscriber(
        &mut self,
        id: &SubscriberId,
    ) -> Result<Option<Subscriber>, DomainError> {
        let sql = format!(
            "SELECT {} FROM subscribers WHERE id = $1 FOR UPDATE",
            SUBSCRIBER_COLUMNS
        );
        let row: Option<SubscriberRow> = sqlx::query_as(&sql)
            .bind(id.as_str())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| db_error("Failed to lock subscriber", e))?;
        row.map(Subscriber::try_from).transpose()
    }

    async fn count_active(&mut self, id: &SubscriberId) -> Result<u32, DomainError> {
        let n: i64 = sqlx::query_scalar(COUNT_ACTIVE_SQL)
            .bind(id.as_str())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| db_error("Failed to count attempts", e))?;
        Ok(to_count(n))
    }

    async fn insert_attempt(
        &mut self,
        id: &SubscriberId,
        attempt: &NewAttempt,
    ) -> Result<AttemptId, DomainError> {
        let attempt_id = AttemptId::new();
        sqlx::query(
            r#"
            INSERT INTO attempts (id, subscriber_id, occurred_at, payload)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(attempt_id.as_uuid())
        .bind(id.as_str())
        .bind(attempt.occurred_at.as_datetime())
        .bind(&attempt.body)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to insert attempt", e))?;
        Ok(attempt_id)
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        self.tx
            .commit()
            .await
            .map_err(|e| db_error("Failed to commit ledger transaction", e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), DomainError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| db_error("Failed to roll back ledger transaction", e))
    }
}
