//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! This module provides adapters for PostgreSQL-backed persistence:
//! - `PostgresSubscriberRepository` - subscriber billing state
//! - `PostgresAttemptStore` - attempts and the SERIALIZABLE ledger transaction
//! - `PostgresProcessedEventStore` - webhook idempotency markers
//! - `PostgresAuditLog` - append-only audit trail

mod attempt_store;
mod audit_log;
mod errors;
mod processed_event_store;
mod subscriber_repository;

pub use attempt_store::PostgresAttemptStore;
pub use audit_log::PostgresAuditLog;
pub use processed_event_store::PostgresProcessedEventStore;
pub use subscriber_repository::PostgresSubscriberRepository;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::DatabaseConfig;

/// Opens a connection pool sized and timed from configuration.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .min_connections(config.min_connections)
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout())
        .idle_timeout(config.idle_timeout())
        .max_lifetime(config.max_lifetime())
        .connect(&config.url)
        .await
}

/// Applies the SQL migrations under `migrations/`.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    tracing::info!("Running database migrations");
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations completed");
    Ok(())
}
