//! HTTP adapter for billing endpoints.
//!
//! - `POST /api/billing/webhook` - Provider webhooks
//! - `POST /api/billing/sync` - Return-URL sync after checkout
//! - `POST /api/billing/sync-fallback` - Manual sync by customer
//! - `POST /api/billing/checkout` - Start hosted checkout
//! - `POST /api/billing/portal` - Billing portal link

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::*;
pub use routes::billing_routes;
