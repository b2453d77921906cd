//! Service entry point: load configuration, wire adapters, serve HTTP.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{info, warn};

use practice_entitlements::adapters::http::{api_router, AppState, HttpSettings};
use practice_entitlements::adapters::postgres::{
    self, PostgresAttemptStore, PostgresAuditLog, PostgresProcessedEventStore,
    PostgresSubscriberRepository,
};
use practice_entitlements::adapters::rate_limiter::{
    FallbackRateLimiter, InMemoryRateLimiter, RedisRateLimiter,
};
use practice_entitlements::adapters::stripe::{StripeConfig, StripePaymentAdapter};
use practice_entitlements::config::{AppConfig, RedisConfig};
use practice_entitlements::domain::billing::WebhookVerifier;
use practice_entitlements::domain::foundation::Timestamp;
use practice_entitlements::ports::{ProcessedEventStore, RateLimiter};
use practice_entitlements::telemetry;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Processed-event markers older than this are purged.
const MARKER_RETENTION_DAYS: i64 = 30;
const MARKER_PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = AppConfig::load()?;
    config.validate()?;
    telemetry::init(&config.logging)?;

    info!(
        environment = ?config.server.environment,
        test_mode = config.payment.is_test_mode(),
        "Starting practice-entitlements"
    );

    let pool = postgres::connect(&config.database).await?;
    if config.database.run_migrations {
        postgres::run_migrations(&pool).await?;
    }

    let processed_events: Arc<dyn ProcessedEventStore> =
        Arc::new(PostgresProcessedEventStore::new(pool.clone()));
    spawn_marker_purge(processed_events.clone());

    let mut stripe = StripeConfig::new(config.payment.stripe_secret_key.clone())
        .with_timeout(config.payment.timeout());
    if let Some(url) = &config.payment.api_base_url {
        stripe = stripe.with_base_url(url.clone());
    }

    let state = AppState {
        subscribers: Arc::new(PostgresSubscriberRepository::new(pool.clone())),
        attempts: Arc::new(PostgresAttemptStore::new(pool.clone())),
        processed_events,
        audit_log: Arc::new(PostgresAuditLog::new(pool)),
        rate_limiter: build_rate_limiter(&config.redis).await,
        payment_provider: Arc::new(StripePaymentAdapter::new(stripe)?),
        webhook_verifier: WebhookVerifier::new(config.payment.webhook_secret()),
        settings: HttpSettings::from_config(&config),
    };

    let router = api_router(
        state,
        Duration::from_secs(config.server.request_timeout_secs),
    );

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Shut down");
    Ok(())
}

/// Redis-backed counters when configured and reachable, otherwise local ones.
async fn build_rate_limiter(config: &RedisConfig) -> Arc<dyn RateLimiter> {
    let Some(url) = config.url() else {
        info!("No Redis configured, rate limits are per process");
        return Arc::new(InMemoryRateLimiter::new());
    };

    match tokio::time::timeout(config.timeout(), RedisRateLimiter::connect(url)).await {
        Ok(Ok(redis)) => {
            info!("Rate limits backed by Redis");
            Arc::new(FallbackRateLimiter::new(Arc::new(redis)))
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Redis unavailable at startup, rate limits are per process");
            Arc::new(InMemoryRateLimiter::new())
        }
        Err(_) => {
            warn!("Redis connect timed out, rate limits are per process");
            Arc::new(InMemoryRateLimiter::new())
        }
    }
}

fn spawn_marker_purge(store: Arc<dyn ProcessedEventStore>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(MARKER_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let cutoff = Timestamp::now().add_days(-MARKER_RETENTION_DAYS);
            match store.delete_before(cutoff).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "Purged processed-event markers"),
                Err(e) => warn!(error = %e, "Processed-event marker purge failed"),
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
