//! CreatePortalHandler - Command handler for the provider's billing portal.

use std::sync::Arc;

use crate::domain::foundation::SubscriberId;
use crate::ports::{PaymentProvider, PortalSession, SubscriberRepository};

use super::{BillingError, CheckoutSettings};

/// Command to open the billing portal for the caller.
#[derive(Debug, Clone)]
pub struct CreatePortalCommand {
    pub subscriber_id: SubscriberId,
}

/// Handler for billing portal sessions.
pub struct CreatePortalHandler {
    subscribers: Arc<dyn SubscriberRepository>,
    provider: Arc<dyn PaymentProvider>,
    settings: CheckoutSettings,
}

impl CreatePortalHandler {
    pub fn new(
        subscribers: Arc<dyn SubscriberRepository>,
        provider: Arc<dyn PaymentProvider>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            subscribers,
            provider,
            settings,
        }
    }

    /// # Errors
    ///
    /// `NoCustomer` when the caller never went through checkout.
    pub async fn handle(&self, cmd: CreatePortalCommand) -> Result<PortalSession, BillingError> {
        let customer_ref = self
            .subscribers
            .find(&cmd.subscriber_id)
            .await?
            .and_then(|s| s.payment_customer_ref)
            .ok_or(BillingError::NoCustomer)?;

        Ok(self
            .provider
            .create_portal_session(&customer_ref, &self.settings.account_url())
            .await?)
    }
}
