//! Axum router configuration for billing endpoints.

use axum::{routing::post, Router};

use crate::adapters::http::AppState;
use super::handlers::{
    create_checkout, create_portal, handle_webhook, sync_fallback, sync_on_return,
};

/// Create the billing API router.
///
/// # Routes
///
/// ## Subscriber endpoints (require `X-User-Id`)
/// - `POST /sync` - Return-URL sync (`?session_id=`)
/// - `POST /sync-fallback` - Manual fallback sync
/// - `POST /checkout` - Start hosted checkout
/// - `POST /portal` - Open billing portal
///
/// ## Webhook endpoint (no auth, signature verified)
/// - `POST /webhook` - Provider event delivery
pub fn billing_routes() -> Router<AppState> {
    Router::new()
        .route("/webhook", post(handle_webhook))
        .route("/sync", post(sync_on_return))
        .route("/sync-fallback", post(sync_fallback))
        .route("/checkout", post(create_checkout))
        .route("/portal", post(create_portal))
}
