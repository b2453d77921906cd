//! Billing handlers.
//!
//! Three entry points feed provider state into the [`Reconciler`]:
//! webhooks, return-URL sync and fallback sync. Checkout and portal
//! sessions are opened here too.

mod create_checkout;
mod create_portal;
mod errors;
mod fallback_sync;
mod process_webhook;
mod reconciler;
mod sync_on_return;

pub use errors::BillingError;
pub use reconciler::Reconciler;

// Commands
pub use create_checkout::{CheckoutSettings, CreateCheckoutCommand, CreateCheckoutHandler};
pub use create_portal::{CreatePortalCommand, CreatePortalHandler};
pub use fallback_sync::{
    FallbackSyncCommand, FallbackSyncHandler, FallbackSyncResult, NotSyncedReason,
};
pub use process_webhook::{ProcessWebhookCommand, ProcessWebhookHandler};
pub use sync_on_return::{SyncOnReturnCommand, SyncOnReturnHandler, SyncOnReturnResult};
