//! HTTP handlers for billing endpoints.

use axum::body::Bytes;
use axum::extract::{Json, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{debug, error};

use crate::application::{
    CreateCheckoutCommand, CreatePortalCommand, FallbackSyncCommand, ProcessWebhookCommand,
    SyncOnReturnCommand,
};

use crate::adapters::http::{
    ApiError, AppState, AuthenticatedSubscriber, ClientInfo, ErrorResponse,
};
use super::dto::{CheckoutRequest, RedirectResponse, SyncParams, SyncResponse, WebhookAck};

/// Header carrying the provider's webhook signature.
pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

/// POST /api/billing/webhook - Provider-signed event delivery
///
/// Duplicates and ignored event types are acknowledged with 200 so the
/// provider stops retrying. A failed handler answers 500 so it retries.
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            ApiError::new(
                StatusCode::BAD_REQUEST,
                "MISSING_SIGNATURE",
                "Missing Stripe-Signature header",
            )
        })?;

    let handler = state.webhook_handler();
    let cmd = ProcessWebhookCommand {
        payload: body.to_vec(),
        signature: signature.to_string(),
    };

    let outcome = handler.handle(cmd).await?;
    debug!(?outcome, "Webhook handled");

    match WebhookAck::for_outcome(&outcome) {
        Some(ack) => Ok((StatusCode::OK, Json(ack)).into_response()),
        None => {
            error!(?outcome, "Webhook handler failed, provider will retry");
            let body = ErrorResponse::new("WEBHOOK_HANDLER_FAILED", "Event processing failed");
            Ok((StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response())
        }
    }
}

/// POST /api/billing/sync?session_id=... - Apply a completed checkout on return
pub async fn sync_on_return(
    State(state): State<AppState>,
    user: AuthenticatedSubscriber,
    ClientInfo(client): ClientInfo,
    Query(params): Query<SyncParams>,
) -> Result<impl IntoResponse, ApiError> {
    let handler = state.sync_on_return_handler();
    let cmd = SyncOnReturnCommand {
        subscriber_id: user.subscriber_id,
        session_id: params.session_id,
        client,
    };

    let result = handler.handle(cmd).await?;
    Ok(Json(SyncResponse::from(result)))
}

/// POST /api/billing/sync-fallback - Pull the latest subscription by customer
///
/// Always answers 200; `synced: false` carries the reason.
pub async fn sync_fallback(
    State(state): State<AppState>,
    user: AuthenticatedSubscriber,
    ClientInfo(client): ClientInfo,
) -> impl IntoResponse {
    let handler = state.fallback_sync_handler();
    let cmd = FallbackSyncCommand {
        subscriber_id: user.subscriber_id,
        client,
    };

    Json(handler.handle(cmd).await)
}

/// POST /api/billing/checkout - Start a hosted checkout
pub async fn create_checkout(
    State(state): State<AppState>,
    user: AuthenticatedSubscriber,
    ClientInfo(client): ClientInfo,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request = CheckoutRequest::from_body(&body);

    let handler = state.checkout_handler();
    let cmd = CreateCheckoutCommand {
        subscriber_id: user.subscriber_id,
        mode: request.checkout_mode(),
        client,
    };

    let session = handler.handle(cmd).await?;
    Ok(Json(RedirectResponse { url: session.url }))
}

/// POST /api/billing/portal - Open the billing portal
pub async fn create_portal(
    State(state): State<AppState>,
    user: AuthenticatedSubscriber,
) -> Result<impl IntoResponse, ApiError> {
    let handler = state.portal_handler();
    let cmd = CreatePortalCommand {
        subscriber_id: user.subscriber_id,
    };

    let session = handler.handle(cmd).await?;
    Ok(Json(RedirectResponse { url: session.url }))
}
