//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables using the
//! `config` and `dotenvy` crates. Variables carry the `ENTITLEMENTS` prefix
//! and nested values are separated by double underscores.
//!
//! # Example
//!
//! ```no_run
//! use practice_entitlements::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod database;
mod entitlement;
mod error;
mod logging;
mod payment;
mod redis;
mod server;

pub use database::DatabaseConfig;
pub use entitlement::EntitlementConfig;
pub use error::{ConfigError, ValidationError};
pub use logging::LoggingConfig;
pub use payment::PaymentConfig;
pub use redis::RedisConfig;
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

use crate::adapters::rate_limiter::RateLimitPolicies;
use crate::application::CheckoutSettings;

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    pub database: DatabaseConfig,

    /// Shared rate limit store; optional
    #[serde(default)]
    pub redis: RedisConfig,

    pub payment: PaymentConfig,

    #[serde(default)]
    pub rate_limits: RateLimitPolicies,

    #[serde(default)]
    pub entitlement: EntitlementConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// Reads `.env` when present, then variables such as
    /// `ENTITLEMENTS__SERVER__PORT=8080` or
    /// `ENTITLEMENTS__RATE_LIMITS__ATTEMPT_CREATE_IP__REQUESTS_PER_WINDOW=100`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or a value
    /// cannot be parsed into its field type.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("ENTITLEMENTS")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns the first `ValidationError` found, section by section.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.redis.validate()?;
        self.payment.validate()?;
        self.rate_limits
            .validate()
            .map_err(ValidationError::InvalidRateLimit)?;
        self.logging.validate()?;
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }

    /// Checkout prices and return links; empty price ids count as unset.
    pub fn checkout_settings(&self) -> CheckoutSettings {
        CheckoutSettings {
            app_url: self.server.app_origin().to_string(),
            subscription_price: self.payment.subscription_price_id.clone(),
            onetime_price: self.payment.onetime_price_id.clone(),
        }
    }
}
