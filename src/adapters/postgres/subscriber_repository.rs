//! PostgreSQL implementation of SubscriberRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::billing::SubscriptionFacts;
use crate::domain::entitlement::{Subscriber, SubscriptionStatus};
use crate::domain::foundation::{DomainError, ErrorCode, SubscriberId, Timestamp};
use crate::ports::SubscriberRepository;

use super::errors::db_error;

pub(crate) const SUBSCRIBER_COLUMNS: &str = "id, subscription_status, free_attempt_cap, \
     current_period_end, payment_customer_ref, payment_subscription_ref, payment_price_ref";

/// Subscriber rows in the `subscribers` table.
pub struct PostgresSubscriberRepository {
    pool: PgPool,
}

impl PostgresSubscriberRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_by_column(
        &self,
        column: &str,
        value: &str,
    ) -> Result<Option<Subscriber>, DomainError> {
        let sql = format!(
            "SELECT {} FROM subscribers WHERE {} = $1 ORDER BY updated_at DESC LIMIT 1",
            SUBSCRIBER_COLUMNS, column
        );
        let row: Option<SubscriberRow> = sqlx::query_as(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to look up subscriber", e))?;
        row.map(Subscriber::try_from).transpose()
    }
}

/// Database row representation of a subscriber.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SubscriberRow {
    id: String,
    subscription_status: String,
    free_attempt_cap: i32,
    current_period_end: Option<DateTime<Utc>>,
    payment_customer_ref: Option<String>,
    payment_subscription_ref: Option<String>,
    payment_price_ref: Option<String>,
}

impl TryFrom<SubscriberRow> for Subscriber {
    type Error = DomainError;

    fn try_from(row: SubscriberRow) -> Result<Self, Self::Error> {
        let id = SubscriberId::new(row.id).map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid subscriber id: {}", e))
        })?;
        let free_attempt_cap = u32::try_from(row.free_attempt_cap).map_err(|_| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Negative free_attempt_cap: {}", row.free_attempt_cap),
            )
        })?;

        Ok(Subscriber {
            id,
            subscription_status: SubscriptionStatus::parse(&row.subscription_status),
            free_attempt_cap,
            current_period_end: row.current_period_end.map(Timestamp::from_datetime),
            payment_customer_ref: row.payment_customer_ref,
            payment_subscription_ref: row.payment_subscription_ref,
            payment_price_ref: row.payment_price_ref,
        })
    }
}

fn cap_to_i32(cap: u32) -> i32 {
    i32::try_from(cap).unwrap_or(i32::MAX)
}

#[async_trait]
impl SubscriberRepository for PostgresSubscriberRepository {
    async fn ensure(&self, id: &SubscriberId, default_cap: u32) -> Result<Subscriber, DomainError> {
        sqlx::query(
            r#"
            INSERT INTO subscribers (id, free_attempt_cap)
            VALUES ($1, $2)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id.as_str())
        .bind(cap_to_i32(default_cap))
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to ensure subscriber", e))?;

        self.find(id).await?.ok_or_else(|| {
            DomainError::new(ErrorCode::SubscriberNotFound, "Subscriber vanished after insert")
        })
    }

    async fn find(&self, id: &SubscriberId) -> Result<Option<Subscriber>, DomainError> {
        let sql = format!("SELECT {} FROM subscribers WHERE id = $1", SUBSCRIBER_COLUMNS);
        let row: Option<SubscriberRow> = sqlx::query_as(&sql)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to find subscriber", e))?;
        row.map(Subscriber::try_from).transpose()
    }

    async fn find_by_subscription_ref(
        &self,
        subscription_ref: &str,
    ) -> Result<Option<Subscriber>, DomainError> {
        self.find_by_column("payment_subscription_ref", subscription_ref)
            .await
    }

    async fn find_by_customer_ref(
        &self,
        customer_ref: &str,
    ) -> Result<Option<Subscriber>, DomainError> {
        self.find_by_column("payment_customer_ref", customer_ref).await
    }

    async fn apply_facts(
        &self,
        id: &SubscriberId,
        facts: &SubscriptionFacts,
    ) -> Result<Option<Subscriber>, DomainError> {
        // Absent facts keep the stored value, so replays converge.
        let sql = format!(
            r#"
            UPDATE subscribers SET
                subscription_status      = COALESCE($2, subscription_status),
                current_period_end       = COALESCE($3, current_period_end),
                payment_customer_ref     = COALESCE($4, payment_customer_ref),
                payment_subscription_ref = COALESCE($5, payment_subscription_ref),
                payment_price_ref        = COALESCE($6, payment_price_ref),
                updated_at               = now()
            WHERE id = $1
            RETURNING {}
            "#,
            SUBSCRIBER_COLUMNS
        );
        let row: Option<SubscriberRow> = sqlx::query_as(&sql)
            .bind(id.as_str())
            .bind(facts.status.map(|s| s.as_str()))
            .bind(facts.current_period_end.map(|t| *t.as_datetime()))
            .bind(facts.customer_ref.as_deref())
            .bind(facts.subscription_ref.as_deref())
            .bind(facts.price_ref.as_deref())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to apply subscription facts", e))?;
        row.map(Subscriber::try_from).transpose()
    }
}
