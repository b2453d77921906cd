//! PostgreSQL implementation of AuditLog.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::audit::AuditEntry;
use crate::domain::foundation::DomainError;
use crate::ports::AuditLog;

use super::errors::db_error;

/// Append-only rows in `audit_log`.
pub struct PostgresAuditLog {
    pool: PgPool,
}

impl PostgresAuditLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditLog for PostgresAuditLog {
    async fn append(&self, entry: AuditEntry) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (subscriber_id, action, created_at, ip, user_agent, metadata)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.subscriber_id.as_ref().map(|id| id.as_str()))
        .bind(entry.action.as_str())
        .bind(entry.created_at.as_datetime())
        .bind(&entry.ip)
        .bind(&entry.user_agent)
        .bind(&entry.metadata)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to append audit entry", e))?;
        Ok(())
    }
}
