//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-side errors to
//! Sentry before responding to the client. All route handlers return
//! `Result<T, AppError>`; every failure body is `{"message": "..."}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use vitrine_core::CartError;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::cart::CartLineError;
use crate::services::checkout::CheckoutError;
use crate::services::otp::OtpError;
use crate::stripe::webhook::WebhookError;

const INTERNAL_MESSAGE: &str = "Internal server error";
const GATEWAY_MESSAGE: &str = "Something went wrong";

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication or account operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// One-time code operation failed.
    #[error("OTP error: {0}")]
    Otp(#[from] OtpError),

    /// Checkout flow failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Product can't be added to the cart.
    #[error("Cart line error: {0}")]
    CartLine(#[from] CartLineError),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Webhook delivery rejected.
    #[error("Webhook error: {0}")]
    Webhook(#[from] WebhookError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User lacks permission.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn internal() -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_string())
}

fn repository_status(err: &RepositoryError) -> (StatusCode, String) {
    match err {
        RepositoryError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
        RepositoryError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => internal(),
    }
}

fn auth_status(err: &AuthError) -> (StatusCode, String) {
    match err {
        AuthError::InvalidEmail(_) => (StatusCode::BAD_REQUEST, "Invalid email address".to_string()),
        AuthError::InvalidName(_)
        | AuthError::WeakPassword(_)
        | AuthError::WrongPassword
        | AuthError::PasswordMismatch => (StatusCode::BAD_REQUEST, err.to_string()),
        AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, err.to_string()),
        AuthError::UserNotFound => (StatusCode::NOT_FOUND, err.to_string()),
        AuthError::Taken { .. } => (StatusCode::CONFLICT, err.to_string()),
        AuthError::Repository(e) => repository_status(e),
        AuthError::PasswordHash => internal(),
    }
}

fn otp_status(err: &OtpError) -> (StatusCode, String) {
    match err {
        OtpError::NotFound | OtpError::Repository(RepositoryError::NotFound) => (
            StatusCode::NOT_FOUND,
            OtpError::NotFound.to_string(),
        ),
        OtpError::Expired | OtpError::Incorrect => (StatusCode::BAD_REQUEST, err.to_string()),
        OtpError::Repository(e) => repository_status(e),
        OtpError::Hash | OtpError::Email(_) => internal(),
    }
}

fn checkout_status(err: &CheckoutError) -> (StatusCode, String) {
    match err {
        CheckoutError::EmptyCart => (StatusCode::BAD_REQUEST, err.to_string()),
        CheckoutError::Money(_) => (StatusCode::BAD_REQUEST, "Invalid cart total".to_string()),
        CheckoutError::Gateway(_) => (StatusCode::BAD_GATEWAY, GATEWAY_MESSAGE.to_string()),
        CheckoutError::Repository(RepositoryError::Conflict(_)) => (
            StatusCode::CONFLICT,
            "Order changed while updating, please retry".to_string(),
        ),
        CheckoutError::Repository(e) => repository_status(e),
    }
}

impl AppError {
    /// HTTP status and client-safe message.
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::Database(e) => repository_status(e),
            Self::Auth(e) => auth_status(e),
            Self::Otp(e) => otp_status(e),
            Self::Checkout(e) => checkout_status(e),
            Self::Cart(e) => match e {
                CartError::ItemNotFound(_) => {
                    (StatusCode::NOT_FOUND, "Cart item not found".to_string())
                }
                CartError::Money(_) => (StatusCode::BAD_REQUEST, "Invalid cart total".to_string()),
                CartError::Storage(_) => internal(),
            },
            Self::CartLine(e) => match e {
                CartLineError::ProductNotFound => (StatusCode::NOT_FOUND, e.to_string()),
                _ => (StatusCode::BAD_REQUEST, e.to_string()),
            },
            Self::Webhook(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "Too many requests".to_string()),
            Self::Session(_) | Self::Internal(_) => internal(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                status = status.as_u16(),
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (status, Json(json!({ "message": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added item", Some(&[("product_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;

    use crate::stripe::StripeError;

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    async fn get_body(err: AppError) -> serde_json::Value {
        let response = err.into_response();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_domain_error_statuses() {
        assert_eq!(
            get_status(RepositoryError::Conflict("x".to_string()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(CheckoutError::EmptyCart.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(get_status(OtpError::NotFound.into()), StatusCode::NOT_FOUND);
        assert_eq!(get_status(OtpError::Expired.into()), StatusCode::BAD_REQUEST);
        assert_eq!(
            get_status(OtpError::Incorrect.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(
                AuthError::Taken {
                    email: true,
                    name: false
                }
                .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(WebhookError::MissingSignature.into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_gateway_error_is_generic() {
        let err: AppError = CheckoutError::Gateway(StripeError::Api {
            status: 402,
            code: Some("card_declined".to_string()),
            message: "Your card was declined.".to_string(),
        })
        .into();

        assert_eq!(
            get_body(err).await,
            json!({ "message": "Something went wrong" })
        );
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let body = get_body(AppError::Internal("connection refused to 10.0.0.3".to_string())).await;
        assert_eq!(body, json!({ "message": "Internal server error" }));
    }

    #[tokio::test]
    async fn test_body_is_flat_message() {
        let body = get_body(AppError::BadRequest("Quantity must be at least 1".to_string())).await;
        assert_eq!(body, json!({ "message": "Quantity must be at least 1" }));
    }
}
