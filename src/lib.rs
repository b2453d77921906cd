//! Practice Entitlements - free-quota metering and billing consistency
//!
//! Decides whether a subscriber may record another scored practice attempt,
//! enforces the free-tier cap under concurrency, and keeps subscription state
//! consistent with the payment provider through webhooks and manual syncs.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod telemetry;
