//! Attempt handlers.
//!
//! ## Commands
//! - Creating an attempt (rate limit, validation, locked ledger write)
//! - Soft-deleting an attempt
//!
//! ## Queries
//! - Listing attempts with the current entitlement
//! - Reading the entitlement alone

mod create_attempt;
mod delete_attempt;
mod errors;
mod get_entitlement;
mod list_attempts;

pub use errors::AttemptError;

// Commands
pub use create_attempt::{CreateAttemptCommand, CreateAttemptHandler, CreateAttemptResult};
pub use delete_attempt::{DeleteAttemptCommand, DeleteAttemptHandler};

// Queries
pub use get_entitlement::{GetEntitlementHandler, GetEntitlementQuery};
pub use list_attempts::{
    ListAttemptsHandler, ListAttemptsQuery, ListAttemptsResult, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT,
};
