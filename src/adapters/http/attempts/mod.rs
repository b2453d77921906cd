//! HTTP adapter for entitlement and attempt endpoints.
//!
//! - `GET /api/entitlement` - Current subscriber's entitlement
//! - `GET /api/attempts` - Newest attempts plus entitlement
//! - `POST /api/attempts` - Record a metered attempt
//! - `DELETE /api/attempts/:id` - Soft delete an attempt

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::*;
pub use routes::attempt_routes;
