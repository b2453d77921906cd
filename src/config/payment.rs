//! Payment configuration (Stripe)

use secrecy::SecretString;
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Payment configuration (Stripe)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentConfig {
    /// Stripe secret API key
    pub stripe_secret_key: String,

    /// Stripe webhook signing secret
    pub stripe_webhook_secret: String,

    /// Price for the recurring Pro plan
    pub subscription_price_id: Option<String>,

    /// Price for the one-time Pro purchase
    pub onetime_price_id: Option<String>,

    /// Stripe API base URL override (local mocks)
    pub api_base_url: Option<String>,

    /// Upper bound on provider calls made from the fallback sync path
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl PaymentConfig {
    /// Check if using Stripe test mode
    pub fn is_test_mode(&self) -> bool {
        self.stripe_secret_key.starts_with("sk_test_")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn secret_key(&self) -> SecretString {
        SecretString::new(self.stripe_secret_key.clone())
    }

    pub fn webhook_secret(&self) -> SecretString {
        SecretString::new(self.stripe_webhook_secret.clone())
    }

    /// Validate payment configuration
    ///
    /// Price ids stay optional: a missing price fails only the checkout
    /// request for that mode.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.stripe_secret_key.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE_SECRET_KEY"));
        }
        if self.stripe_webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE_WEBHOOK_SECRET"));
        }
        if !self.stripe_secret_key.starts_with("sk_") && !self.stripe_secret_key.starts_with("rk_") {
            return Err(ValidationError::InvalidStripeKey);
        }
        if !self.stripe_webhook_secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }
        if self.timeout_secs == 0 || self.timeout_secs > 60 {
            return Err(ValidationError::InvalidProviderTimeout);
        }
        Ok(())
    }
}

fn default_timeout_secs() -> u64 {
    8
}
