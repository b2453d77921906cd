//! HTTP adapters - REST API implementations.
//!
//! Each area has its own module with DTOs, handlers and routes. Shared
//! pieces live alongside: `AppState`, request extractors, `ApiError`.

pub mod attempts;
pub mod billing;
mod error;
mod extract;
mod state;

pub use attempts::attempt_routes;
pub use billing::billing_routes;
pub use error::{ApiError, ErrorResponse};
pub use extract::{client_ip, AuthenticatedSubscriber, ClientInfo, USER_ID_HEADER};
pub use state::{AppState, HttpSettings};

use std::time::Duration;

use axum::{routing::get, Json, Router};
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Build the complete service router.
///
/// # Routes
/// - `GET /health` - Liveness
/// - `/api/...` - Entitlement and attempt endpoints
/// - `/api/billing/...` - Billing endpoints
pub fn api_router(state: AppState, request_timeout: Duration) -> Router {
    let api = attempt_routes().nest("/billing", billing_routes());

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(request_timeout)),
        )
}

/// GET /health - Liveness
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
