//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! - `RateLimiter` - fixed-window request counters
//! - `SubscriberRepository` - subscriber billing state
//! - `AttemptStore` / `LedgerTransaction` - attempt persistence and the locked ledger path
//! - `ProcessedEventStore` - webhook idempotency markers
//! - `AuditLog` - append-only audit trail
//! - `PaymentProvider` - outbound billing provider API

mod attempt_store;
mod audit_log;
mod payment_provider;
mod processed_event_store;
mod rate_limiter;
mod subscriber_repository;

pub use attempt_store::{AttemptStore, LedgerTransaction};
pub use audit_log::AuditLog;
pub use payment_provider::{
    CheckoutSession, CreateCheckoutRequest, PaymentError, PaymentErrorCode, PaymentProvider,
    PortalSession,
};
pub use processed_event_store::{MarkResult, ProcessedEventStore};
pub use rate_limiter::{
    RateLimitDecision, RateLimitError, RateLimitKey, RateLimitScope, RateLimiter, WindowLimit,
};
pub use subscriber_repository::SubscriberRepository;
