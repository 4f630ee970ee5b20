//! Payment gateway webhooks.
//!
//! The raw body is needed for signature verification, so the handler takes
//! `Bytes` instead of `Json`.

use axum::{Json, body::Bytes, extract::State, http::HeaderMap};
use chrono::Utc;
use secrecy::ExposeSecret;
use serde_json::{Value, json};
use tracing::instrument;

use crate::db::OrderRepository;
use crate::error::Result;
use crate::services::checkout::apply_webhook_event;
use crate::state::AppState;
use crate::stripe::webhook::{SIGNATURE_HEADER, WebhookError, parse_event, verify_signature};

/// Handle a Stripe event.
///
/// POST /api/webhooks/stripe
///
/// Signature failures answer 400. A database failure answers 500 so Stripe
/// redelivers the event.
#[instrument(skip_all)]
pub async fn stripe(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingSignature)?;

    let config = &state.config().stripe;
    verify_signature(
        config.webhook_secret.expose_secret(),
        signature,
        &body,
        Utc::now().timestamp(),
        config.webhook_tolerance,
    )?;

    let event = parse_event(&body)?;
    apply_webhook_event(&OrderRepository::new(state.pool()), &event).await?;

    Ok(Json(json!({ "received": true })))
}
