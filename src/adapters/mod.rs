//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `http` - axum REST API
//! - `postgres` - subscriber, attempt, idempotency and audit persistence
//! - `rate_limiter` - Redis and in-process fixed-window counters
//! - `stripe` - payment provider API
//! - `memory` - in-process stores for tests and local runs

pub mod http;
pub mod memory;
pub mod postgres;
pub mod rate_limiter;
pub mod stripe;
