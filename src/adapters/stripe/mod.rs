//! Stripe payment provider adapter.
//!
//! Implements the `PaymentProvider` port for Stripe:
//! - Customer creation
//! - Hosted checkout and billing portal sessions
//! - Checkout session and subscription retrieval for reconciliation
//!
//! Webhook signature verification lives in `domain::billing`, since it needs
//! only the signing secret and no network access.
//!
//! # Security
//!
//! - The API key is held as `secrecy::SecretString` and never logged

mod mock_payment_provider;
mod stripe_adapter;

pub use mock_payment_provider::{MethodCall, MockPaymentProvider};
pub use stripe_adapter::{StripeConfig, StripePaymentAdapter};
