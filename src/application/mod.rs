//! Application layer - Commands, Queries, and Handlers.
//!
//! Orchestrates domain rules over ports. The attempt ledger and the audit
//! trail are shared building blocks; handlers compose them per request.

mod audit;
pub mod handlers;
mod ledger;

pub use audit::AuditTrail;
pub use ledger::{AttemptLedger, LedgerOutcome};

pub use handlers::attempts::{
    AttemptError, CreateAttemptCommand, CreateAttemptHandler, CreateAttemptResult,
    DeleteAttemptCommand, DeleteAttemptHandler, GetEntitlementHandler, GetEntitlementQuery,
    ListAttemptsHandler, ListAttemptsQuery, ListAttemptsResult,
};
pub use handlers::billing::{
    BillingError, CheckoutSettings, CreateCheckoutCommand, CreateCheckoutHandler,
    CreatePortalCommand, CreatePortalHandler, FallbackSyncCommand, FallbackSyncHandler,
    FallbackSyncResult, NotSyncedReason, ProcessWebhookCommand, ProcessWebhookHandler,
    Reconciler, SyncOnReturnCommand, SyncOnReturnHandler, SyncOnReturnResult,
};
