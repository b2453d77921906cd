//! HTTP handlers for entitlement and attempt endpoints.

use axum::body::Bytes;
use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::{
    AttemptError, CreateAttemptCommand, DeleteAttemptCommand, GetEntitlementQuery,
    ListAttemptsQuery,
};
use crate::domain::foundation::AttemptId;

use crate::adapters::http::{ApiError, AppState, AuthenticatedSubscriber, ClientInfo};
use super::dto::{
    CreateAttemptResponse, EntitlementResponse, ListAttemptsParams, ListAttemptsResponse,
};

/// GET /api/entitlement - Entitlement for the current subscriber
pub async fn get_entitlement(
    State(state): State<AppState>,
    user: AuthenticatedSubscriber,
) -> Result<impl IntoResponse, ApiError> {
    let handler = state.get_entitlement_handler();
    let query = GetEntitlementQuery {
        subscriber_id: user.subscriber_id,
    };

    let entitlement = handler.handle(query).await?;
    Ok(Json(EntitlementResponse::from(entitlement)))
}

/// GET /api/attempts - Newest attempts plus entitlement
pub async fn list_attempts(
    State(state): State<AppState>,
    user: AuthenticatedSubscriber,
    Query(params): Query<ListAttemptsParams>,
) -> Result<impl IntoResponse, ApiError> {
    let handler = state.list_attempts_handler();
    let query = ListAttemptsQuery {
        subscriber_id: user.subscriber_id,
        limit: params.limit,
    };

    let result = handler.handle(query).await?;
    Ok(Json(ListAttemptsResponse::from(result)))
}

/// POST /api/attempts - Record a metered attempt
///
/// The body is decoded by the handler after the rate limit is counted.
pub async fn create_attempt(
    State(state): State<AppState>,
    user: AuthenticatedSubscriber,
    ClientInfo(client): ClientInfo,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let handler = state.create_attempt_handler();
    let cmd = CreateAttemptCommand {
        subscriber_id: user.subscriber_id,
        body: body.to_vec(),
        client,
    };

    let result = handler.handle(cmd).await?;
    Ok((StatusCode::CREATED, Json(CreateAttemptResponse::from(result))))
}

/// DELETE /api/attempts/:id - Soft delete one of the caller's attempts
pub async fn delete_attempt(
    State(state): State<AppState>,
    user: AuthenticatedSubscriber,
    ClientInfo(client): ClientInfo,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    // A malformed id cannot name one of the caller's attempts
    let attempt_id: AttemptId = id.parse().map_err(|_| AttemptError::NotFound)?;

    let handler = state.delete_attempt_handler();
    let cmd = DeleteAttemptCommand {
        subscriber_id: user.subscriber_id,
        attempt_id,
        client,
    };

    handler.handle(cmd).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}
