//! Billing domain.
//!
//! Provider events and objects, the facts they reduce to, and the outcome
//! vocabulary of idempotent event processing.

mod errors;
mod event;
mod facts;
mod interpret;
mod objects;
mod outcome;
mod verifier;

pub use errors::WebhookError;
pub use event::{ProviderEvent, ProviderEventData, ProviderEventKind};
pub use facts::{
    CheckoutMode, CheckoutSessionSnapshot, ProviderInvoice, ProviderSubscription,
    SubscriberLookup, SubscriptionFacts,
};
pub use interpret::BillingEvent;
pub use objects::{
    CheckoutSessionObject, CustomerObject, Expandable, HasId, InvoiceLineObject, InvoiceObject,
    ListObject, PeriodObject, PriceObject, SubscriptionItemObject, SubscriptionObject,
};
pub use outcome::EventOutcome;
pub use verifier::{sign_payload, SignatureHeader, WebhookVerifier};
