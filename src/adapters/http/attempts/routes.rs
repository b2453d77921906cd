//! Axum router configuration for entitlement and attempt endpoints.

use axum::{
    routing::{delete, get},
    Router,
};

use crate::adapters::http::AppState;
use super::handlers::{create_attempt, delete_attempt, get_entitlement, list_attempts};

/// Create the attempts API router.
///
/// # Routes
/// - `GET /entitlement` - Current entitlement
/// - `GET /attempts` - List attempts (`?limit=N`)
/// - `POST /attempts` - Record an attempt
/// - `DELETE /attempts/:id` - Soft delete an attempt
pub fn attempt_routes() -> Router<AppState> {
    Router::new()
        .route("/entitlement", get(get_entitlement))
        .route("/attempts", get(list_attempts).post(create_attempt))
        .route("/attempts/:id", delete(delete_attempt))
}
