//! PostgreSQL implementation of ProcessedEventStore.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::{MarkResult, ProcessedEventStore};

use super::errors::db_error;

/// Idempotency markers in `processed_events`, unique on `event_id`.
pub struct PostgresProcessedEventStore {
    pool: PgPool,
}

impl PostgresProcessedEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn mark_result(rows_affected: u64) -> MarkResult {
    if rows_affected == 0 {
        MarkResult::AlreadyExists
    } else {
        MarkResult::Inserted
    }
}

#[async_trait]
impl ProcessedEventStore for PostgresProcessedEventStore {
    async fn contains(&self, event_id: &str) -> Result<bool, DomainError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM processed_events WHERE event_id = $1)",
        )
        .bind(event_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to check processed event", e))?;
        Ok(exists)
    }

    async fn try_mark(&self, event_id: &str) -> Result<MarkResult, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO processed_events (event_id, processed_at)
            VALUES ($1, now())
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(event_id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to mark event processed", e))?;
        Ok(mark_result(result.rows_affected()))
    }

    async fn unmark(&self, event_id: &str) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM processed_events WHERE event_id = $1")
            .bind(event_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to unmark event", e))?;
        Ok(())
    }

    async fn delete_before(&self, cutoff: Timestamp) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM processed_events WHERE processed_at < $1")
            .bind(cutoff.as_datetime())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to purge processed events", e))?;
        Ok(result.rows_affected())
    }
}
