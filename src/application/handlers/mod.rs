//! Application handlers.
//!
//! Command and query handlers that orchestrate domain rules over ports.

pub mod attempts;
pub mod billing;
