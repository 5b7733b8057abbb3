use crate::db;
use crate::domain::models::PaymentStatus;
use crate::services::payments::{self, GatewayEvent};
use crate::state::SharedState;
use crate::web::error::ApiError;
use crate::web::session::UserSession;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/webhook", post(webhook))
        .route("/:reference", get(get_by_ref))
        .with_state(state)
}

#[derive(Serialize)]
struct WebhookAck {
    ok: bool,
}

/// Gateway callback. The signature covers the raw body, so this handler takes
/// `Bytes` and only deserializes after verification.
async fn webhook(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let signature = headers
        .get("x-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    if !payments::verify_signature(&state.webhook_secret, &body, signature) {
        tracing::warn!("Webhook signature verification failed");
        return Err(ApiError::Unauthorized);
    }

    let event: GatewayEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("malformed webhook body: {e}")))?;

    let status = PaymentStatus::from_gateway(&event.status).ok_or_else(|| {
        ApiError::BadRequest(format!("unknown gateway status: {}", event.status))
    })?;

    let payment = db::upsert_payment(
        &state.pool,
        &event.reference,
        event.user_id,
        event.course_id,
        event.amount_cents,
        &event.currency,
        status,
    )
    .await?;

    tracing::info!(
        "Payment {} is now {:?} ({} {})",
        payment.external_ref,
        payment.status,
        payment.amount_cents,
        payment.currency
    );

    Ok(Json(WebhookAck { ok: true }))
}

/// Look a payment up by its gateway reference. Falls back to the gateway's
/// reporting API when the webhook never arrived, and stores what it learns.
async fn get_by_ref(
    UserSession(_claims): UserSession,
    State(state): State<SharedState>,
    Path(reference): Path<String>,
) -> Result<Json<db::Payment>, ApiError> {
    if let Some(payment) = db::get_payment_by_ref(&state.pool, &reference).await? {
        return Ok(Json(payment));
    }

    let remote = state
        .gateway
        .fetch_payment(&reference)
        .await
        .map_err(|e| ApiError::Upstream(format!("payment gateway: {e}")))?;
    let status = PaymentStatus::from_gateway(&remote.status).ok_or_else(|| {
        ApiError::Upstream(format!("unknown gateway status: {}", remote.status))
    })?;

    let payment = db::upsert_payment(
        &state.pool,
        &remote.reference,
        None,
        None,
        remote.amount_cents,
        &remote.currency,
        status,
    )
    .await?;
    Ok(Json(payment))
}
