//! Shared application state.

use std::sync::Arc;
use std::time::Duration;

use crate::adapters::rate_limiter::RateLimitPolicies;
use crate::application::{
    AttemptLedger, AuditTrail, CheckoutSettings, CreateAttemptHandler, CreateCheckoutHandler,
    CreatePortalHandler, DeleteAttemptHandler, FallbackSyncHandler, GetEntitlementHandler,
    ListAttemptsHandler, ProcessWebhookHandler, Reconciler, SyncOnReturnHandler,
};
use crate::config::{AppConfig, EntitlementConfig};
use crate::domain::billing::WebhookVerifier;
use crate::ports::{
    AttemptStore, AuditLog, PaymentProvider, ProcessedEventStore, RateLimiter,
    SubscriberRepository,
};

/// Non-port settings the HTTP handlers need.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub rate_limits: RateLimitPolicies,
    pub entitlement: EntitlementConfig,
    pub checkout: CheckoutSettings,
    /// Upper bound on the fallback sync's provider call.
    pub provider_timeout: Duration,
}

impl HttpSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            rate_limits: config.rate_limits.clone(),
            entitlement: config.entitlement.clone(),
            checkout: config.checkout_settings(),
            provider_timeout: config.payment.timeout(),
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            rate_limits: RateLimitPolicies::default(),
            entitlement: EntitlementConfig::default(),
            checkout: CheckoutSettings::default(),
            provider_timeout: Duration::from_secs(10),
        }
    }
}

/// Shared application state containing all dependencies.
///
/// Cloned for each request; every dependency is Arc-wrapped. Handlers are
/// built on demand from the shared ports.
#[derive(Clone)]
pub struct AppState {
    pub subscribers: Arc<dyn SubscriberRepository>,
    pub attempts: Arc<dyn AttemptStore>,
    pub processed_events: Arc<dyn ProcessedEventStore>,
    pub audit_log: Arc<dyn AuditLog>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub payment_provider: Arc<dyn PaymentProvider>,
    pub webhook_verifier: WebhookVerifier,
    pub settings: HttpSettings,
}

impl AppState {
    fn default_cap(&self) -> u32 {
        self.settings.entitlement.default_free_cap
    }

    fn audit(&self) -> AuditTrail {
        AuditTrail::new(self.audit_log.clone())
    }

    fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.subscribers.clone(), self.default_cap())
    }

    pub fn get_entitlement_handler(&self) -> GetEntitlementHandler {
        GetEntitlementHandler::new(
            self.subscribers.clone(),
            self.attempts.clone(),
            self.settings.entitlement.grace,
            self.default_cap(),
        )
    }

    pub fn list_attempts_handler(&self) -> ListAttemptsHandler {
        ListAttemptsHandler::new(
            self.subscribers.clone(),
            self.attempts.clone(),
            self.settings.entitlement.grace,
            self.default_cap(),
        )
    }

    pub fn create_attempt_handler(&self) -> CreateAttemptHandler {
        CreateAttemptHandler::new(
            self.subscribers.clone(),
            AttemptLedger::new(self.attempts.clone(), self.settings.entitlement.grace),
            self.rate_limiter.clone(),
            self.settings.rate_limits.clone(),
            self.audit(),
            self.default_cap(),
        )
    }

    pub fn delete_attempt_handler(&self) -> DeleteAttemptHandler {
        DeleteAttemptHandler::new(self.attempts.clone(), self.audit())
    }

    pub fn webhook_handler(&self) -> ProcessWebhookHandler {
        ProcessWebhookHandler::new(
            self.webhook_verifier.clone(),
            self.processed_events.clone(),
            self.reconciler(),
            self.payment_provider.clone(),
            self.audit(),
        )
    }

    pub fn sync_on_return_handler(&self) -> SyncOnReturnHandler {
        SyncOnReturnHandler::new(
            self.payment_provider.clone(),
            self.reconciler(),
            self.audit(),
        )
    }

    pub fn fallback_sync_handler(&self) -> FallbackSyncHandler {
        FallbackSyncHandler::new(
            self.subscribers.clone(),
            self.payment_provider.clone(),
            self.reconciler(),
            self.audit(),
            self.settings.provider_timeout,
            self.default_cap(),
        )
    }

    pub fn checkout_handler(&self) -> CreateCheckoutHandler {
        CreateCheckoutHandler::new(
            self.subscribers.clone(),
            self.payment_provider.clone(),
            self.settings.checkout.clone(),
            self.audit(),
            self.default_cap(),
        )
    }

    pub fn portal_handler(&self) -> CreatePortalHandler {
        CreatePortalHandler::new(
            self.subscribers.clone(),
            self.payment_provider.clone(),
            self.settings.checkout.clone(),
        )
    }
}
