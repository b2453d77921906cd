//! CreateCheckoutHandler - Command handler for starting hosted checkout.

use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::application::AuditTrail;
use crate::domain::audit::{AuditAction, ClientContext};
use crate::domain::billing::{CheckoutMode, SubscriptionFacts};
use crate::domain::entitlement::Subscriber;
use crate::domain::foundation::SubscriberId;
use crate::ports::{CheckoutSession, CreateCheckoutRequest, PaymentProvider, SubscriberRepository};

use super::BillingError;

/// Where checkout sends the browser and which prices it sells.
#[derive(Debug, Clone, Default)]
pub struct CheckoutSettings {
    /// Public origin of the web app, without trailing slash.
    pub app_url: String,
    pub subscription_price: Option<String>,
    pub onetime_price: Option<String>,
}

impl CheckoutSettings {
    pub fn price_for(&self, mode: CheckoutMode) -> Option<&str> {
        let price = match mode {
            CheckoutMode::Subscription => self.subscription_price.as_deref(),
            CheckoutMode::Payment => self.onetime_price.as_deref(),
        };
        price.filter(|p| !p.is_empty())
    }

    /// The provider substitutes `{CHECKOUT_SESSION_ID}` on redirect.
    pub fn success_url(&self) -> String {
        format!(
            "{}/account?checkout=success&session_id={{CHECKOUT_SESSION_ID}}",
            self.app_url
        )
    }

    pub fn cancel_url(&self) -> String {
        format!("{}/account?checkout=cancel", self.app_url)
    }

    pub fn account_url(&self) -> String {
        format!("{}/account", self.app_url)
    }
}

/// Command to open a checkout session for the caller.
#[derive(Debug, Clone)]
pub struct CreateCheckoutCommand {
    pub subscriber_id: SubscriberId,
    pub mode: CheckoutMode,
    pub client: ClientContext,
}

/// Handler for checkout creation.
pub struct CreateCheckoutHandler {
    subscribers: Arc<dyn SubscriberRepository>,
    provider: Arc<dyn PaymentProvider>,
    settings: CheckoutSettings,
    audit: AuditTrail,
    default_cap: u32,
}

impl CreateCheckoutHandler {
    pub fn new(
        subscribers: Arc<dyn SubscriberRepository>,
        provider: Arc<dyn PaymentProvider>,
        settings: CheckoutSettings,
        audit: AuditTrail,
        default_cap: u32,
    ) -> Self {
        Self {
            subscribers,
            provider,
            settings,
            audit,
            default_cap,
        }
    }

    pub async fn handle(&self, cmd: CreateCheckoutCommand) -> Result<CheckoutSession, BillingError> {
        let price_ref = self
            .settings
            .price_for(cmd.mode)
            .ok_or(BillingError::MissingPriceId(cmd.mode.as_str()))?
            .to_string();

        let subscriber = self
            .subscribers
            .ensure(&cmd.subscriber_id, self.default_cap)
            .await?;
        let customer_ref = self.customer_for(&subscriber).await?;

        let session = self
            .provider
            .create_checkout_session(CreateCheckoutRequest {
                subscriber_id: cmd.subscriber_id.clone(),
                customer_ref,
                mode: cmd.mode,
                price_ref,
                success_url: self.settings.success_url(),
                cancel_url: self.settings.cancel_url(),
            })
            .await?;

        info!(subscriber_id = %cmd.subscriber_id, mode = cmd.mode.as_str(), session_id = %session.id, "Checkout session created");
        self.audit
            .record(
                AuditAction::CheckoutStarted,
                Some(&cmd.subscriber_id),
                &cmd.client,
                json!({ "mode": cmd.mode.as_str(), "sessionId": session.id }),
            )
            .await;
        Ok(session)
    }

    /// Existing provider customer, or a new one stored on the subscriber.
    async fn customer_for(&self, subscriber: &Subscriber) -> Result<String, BillingError> {
        if let Some(customer_ref) = &subscriber.payment_customer_ref {
            return Ok(customer_ref.clone());
        }
        let customer_ref = self.provider.create_customer(&subscriber.id).await?;
        let facts = SubscriptionFacts {
            customer_ref: Some(customer_ref.clone()),
            ..Default::default()
        };
        self.subscribers.apply_facts(&subscriber.id, &facts).await?;
        Ok(customer_ref)
    }
}
