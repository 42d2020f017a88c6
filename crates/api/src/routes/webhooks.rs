//! Stripe webhook endpoint.
//!
//! The raw body is verified against the `Stripe-Signature` header before it
//! is parsed. Events go through the idempotency ledger, so Stripe retries of
//! an already-applied event are acknowledged without side effects.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::services::stripe::signature;
use crate::services::webhook::{WebhookError, WebhookOutcome, parse_event};
use crate::state::AppState;

pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

/// Build the webhook router.
pub fn router() -> Router<AppState> {
    Router::new().route("/webhooks/stripe", post(stripe_webhook))
}

const INVALID_PAYLOAD_MESSAGE: &str = "Invalid event payload";

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct WebhookAck {
    pub received: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub duplicate: bool,
}

/// Receive a Stripe event.
///
/// # Errors
///
/// Returns 400 for a missing or invalid signature or an unreadable event,
/// 500 if the billing store fails (Stripe retries the delivery).
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>> {
    let header = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing Stripe-Signature header".to_string()))?;

    signature::verify(&state.config().stripe.webhook_secret, &body, header).map_err(|e| {
        tracing::warn!(error = %e, "Rejected webhook signature");
        AppError::BadRequest("Invalid signature".to_string())
    })?;

    let event = parse_event(&body).map_err(webhook_error)?;
    let outcome = state
        .webhooks()
        .process(&event)
        .await
        .map_err(webhook_error)?;

    Ok(Json(WebhookAck {
        received: true,
        duplicate: outcome == WebhookOutcome::Duplicate,
    }))
}

fn webhook_error(err: WebhookError) -> AppError {
    match err {
        WebhookError::InvalidPayload(detail) => {
            tracing::warn!(error = %detail, "Rejected webhook payload");
            AppError::BadRequest(INVALID_PAYLOAD_MESSAGE.to_string())
        }
        WebhookError::Store(e) => AppError::Database(e),
    }
}
