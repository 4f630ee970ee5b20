//! Stripe webhook signature verification and event parsing.

use std::time::Duration;

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;

use crate::models::order::Address;

/// Header Stripe signs every delivery with.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Errors from webhook verification or parsing.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Missing stripe signature")]
    MissingSignature,

    #[error("Malformed signature header")]
    MalformedHeader,

    #[error("Webhook timestamp outside tolerance")]
    TimestampOutOfTolerance,

    #[error("Signature mismatch")]
    SignatureMismatch,

    #[error("Invalid event payload: {0}")]
    InvalidPayload(String),
}

/// Parsed `t=` and `v1=` parts of a `Stripe-Signature` header.
#[derive(Debug, PartialEq, Eq)]
struct SignatureHeader<'a> {
    timestamp: i64,
    signatures: Vec<&'a str>,
}

fn parse_header(header: &str) -> Result<SignatureHeader<'_>, WebhookError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => {
                timestamp = Some(
                    value
                        .parse::<i64>()
                        .map_err(|_| WebhookError::MalformedHeader)?,
                );
            }
            "v1" => signatures.push(value),
            // v0 and future schemes are ignored.
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(WebhookError::MalformedHeader)?;
    if signatures.is_empty() {
        return Err(WebhookError::MalformedHeader);
    }
    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

/// Constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

/// Hex HMAC-SHA256 of `"{timestamp}.{body}"`.
fn compute_signature(secret: &str, timestamp: i64, body: &[u8]) -> Result<String, WebhookError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| WebhookError::SignatureMismatch)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a delivery against the webhook secret.
///
/// Accepts the body if any `v1` signature matches and `t` is within
/// `tolerance` of `now` (unix seconds).
///
/// # Errors
///
/// Returns the first verification step that failed.
pub fn verify_signature(
    secret: &str,
    header: &str,
    body: &[u8],
    now: i64,
    tolerance: Duration,
) -> Result<(), WebhookError> {
    let parsed = parse_header(header)?;

    let tolerance = i64::try_from(tolerance.as_secs()).unwrap_or(i64::MAX);
    if now.saturating_sub(parsed.timestamp).abs() > tolerance {
        return Err(WebhookError::TimestampOutOfTolerance);
    }

    let expected = compute_signature(secret, parsed.timestamp, body)?;
    if parsed
        .signatures
        .iter()
        .any(|candidate| constant_time_compare(&expected, candidate))
    {
        Ok(())
    } else {
        Err(WebhookError::SignatureMismatch)
    }
}

#[derive(Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    data: RawEventData,
}

#[derive(Deserialize)]
struct RawEventData {
    object: serde_json::Value,
}

#[derive(Deserialize)]
struct RawCharge {
    /// A string id, an expanded object, or null.
    #[serde(default)]
    payment_intent: serde_json::Value,
    #[serde(default)]
    shipping: Option<RawShipping>,
}

#[derive(Deserialize)]
struct RawShipping {
    #[serde(default)]
    address: Option<RawAddress>,
}

#[derive(Deserialize)]
struct RawAddress {
    line1: Option<String>,
    line2: Option<String>,
    city: Option<String>,
    state: Option<String>,
    postal_code: Option<String>,
    country: Option<String>,
}

impl From<RawAddress> for Address {
    fn from(raw: RawAddress) -> Self {
        Self {
            line1: raw.line1.unwrap_or_default(),
            line2: raw.line2.unwrap_or_default(),
            city: raw.city.unwrap_or_default(),
            state: raw.state.unwrap_or_default(),
            postal_code: raw.postal_code.unwrap_or_default(),
            country: raw.country.unwrap_or_default(),
        }
    }
}

/// A verified webhook event, reduced to what the order flow acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    /// A charge succeeded for a payment intent.
    ChargeSucceeded {
        event_id: String,
        payment_intent_id: String,
        address: Option<Address>,
    },
    /// Anything else, acknowledged without action.
    Ignored { event_id: String, kind: String },
}

/// Parse a verified event body.
///
/// A `charge.succeeded` whose `payment_intent` is not a plain string id is
/// ignored.
///
/// # Errors
///
/// Returns `WebhookError::InvalidPayload` if the body is not a Stripe event.
pub fn parse_event(body: &[u8]) -> Result<WebhookEvent, WebhookError> {
    let raw: RawEvent =
        serde_json::from_slice(body).map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;

    if raw.kind != "charge.succeeded" {
        return Ok(WebhookEvent::Ignored {
            event_id: raw.id,
            kind: raw.kind,
        });
    }

    let charge: RawCharge = serde_json::from_value(raw.data.object)
        .map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;

    match charge.payment_intent {
        serde_json::Value::String(payment_intent_id) => Ok(WebhookEvent::ChargeSucceeded {
            event_id: raw.id,
            payment_intent_id,
            address: charge
                .shipping
                .and_then(|s| s.address)
                .map(Address::from),
        }),
        _ => Ok(WebhookEvent::Ignored {
            event_id: raw.id,
            kind: raw.kind,
        }),
    }
}
