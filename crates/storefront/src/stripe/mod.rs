//! Stripe REST client for payment intents.
//!
//! Only the three calls checkout needs are implemented: create, retrieve and
//! amount update. Requests are form-encoded and authenticated with the secret
//! key as a bearer token.
//!
//! Webhook signature verification and event parsing live in [`webhook`].

pub mod webhook;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

use crate::config::StripeConfig;
use crate::services::checkout::PaymentGateway;

/// Errors that can occur when calling Stripe.
#[derive(Debug, Error)]
pub enum StripeError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Stripe answered with an error status.
    #[error("API error: {status} - {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Failed to parse a response or build a request.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl StripeError {
    /// Whether retrying the same call may succeed.
    ///
    /// Network failures, rate limiting (429) and server errors (5xx) are
    /// transient; every other API error is final.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::Parse(_) => false,
        }
    }
}

/// Lifecycle state of a payment intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
    #[serde(other)]
    Unknown,
}

impl IntentStatus {
    /// Whether Stripe still accepts an amount change.
    #[must_use]
    pub const fn is_updatable(self) -> bool {
        matches!(
            self,
            Self::RequiresPaymentMethod | Self::RequiresConfirmation | Self::RequiresAction
        )
    }
}

/// The fields of a Stripe `PaymentIntent` this service reads.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    /// Amount in minor units.
    pub amount: i64,
    pub currency: String,
    pub status: IntentStatus,
    /// Secret handed to the browser to confirm the payment.
    pub client_secret: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    api_base: String,
}

impl StripeClient {
    /// Create a new Stripe client.
    ///
    /// # Errors
    ///
    /// Returns error if the secret key is not a valid header value or the
    /// HTTP client fails to build.
    pub fn new(config: &StripeConfig) -> Result<Self, StripeError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.secret_key.expose_secret());
        let mut auth = HeaderValue::from_str(&auth_value)
            .map_err(|e| StripeError::Parse(format!("Invalid secret key format: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{path}", self.api_base)
    }

    /// Turn a response into a typed intent or a [`StripeError::Api`].
    async fn parse_intent(response: reqwest::Response) -> Result<PaymentIntent, StripeError> {
        let status = response.status();
        if !status.is_success() {
            return Err(Self::api_error(status, response).await);
        }

        response
            .json::<PaymentIntent>()
            .await
            .map_err(|e| StripeError::Parse(e.to_string()))
    }

    async fn api_error(status: StatusCode, response: reqwest::Response) -> StripeError {
        let body = response.text().await.unwrap_or_default();
        let (code, message) = match serde_json::from_str::<ErrorEnvelope>(&body) {
            Ok(envelope) => (
                envelope.error.code,
                envelope.error.message.unwrap_or_default(),
            ),
            Err(_) => (None, body),
        };
        StripeError::Api {
            status: status.as_u16(),
            code,
            message,
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    #[instrument(skip(self), fields(amount = %amount, currency = %currency))]
    async fn create_intent(&self, amount: i64, currency: &str) -> Result<PaymentIntent, StripeError> {
        let amount = amount.to_string();
        let params = [
            ("amount", amount.as_str()),
            ("currency", currency),
            ("automatic_payment_methods[enabled]", "true"),
        ];

        let response = self
            .client
            .post(self.url("payment_intents"))
            .form(&params)
            .send()
            .await?;

        Self::parse_intent(response).await
    }

    #[instrument(skip(self), fields(payment_intent_id = %id))]
    async fn retrieve_intent(&self, id: &str) -> Result<Option<PaymentIntent>, StripeError> {
        let response = self
            .client
            .get(self.url(&format!("payment_intents/{id}")))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::parse_intent(response).await.map(Some)
    }

    #[instrument(skip(self), fields(payment_intent_id = %id, amount = %amount))]
    async fn update_intent_amount(
        &self,
        id: &str,
        amount: i64,
    ) -> Result<PaymentIntent, StripeError> {
        let amount = amount.to_string();
        let params = [("amount", amount.as_str())];

        let response = self
            .client
            .post(self.url(&format!("payment_intents/{id}")))
            .form(&params)
            .send()
            .await?;

        Self::parse_intent(response).await
    }
}
