//! Authentication route handlers.
//!
//! Registration, login/logout, email verification and password reset.
//! Every route here sits behind the strict auth rate limiter, which is also
//! the only throttle on one-time code guesses.

use axum::{Json, extract::State};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use vitrine_core::{Email, Role, UserId};

use crate::db::{OtpRepository, UserRepository};
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireAuth, clear_current_user, set_current_user};
use crate::models::{CurrentUser, User};
use crate::services::auth::{AuthService, validate_password};
use crate::services::otp::OtpService;
use crate::state::AppState;

// =============================================================================
// Request / Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub status: &'static str,
    pub user_id: UserId,
    pub email: Email,
    /// `false` when the code could not be delivered; the client should call
    /// the resend endpoint with `user_id`.
    pub verification_sent: bool,
}

impl RegisterResponse {
    fn pending(user: &User, verification_sent: bool) -> Self {
        Self {
            status: "pending",
            user_id: user.id,
            email: user.email.clone(),
            verification_sent,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// The logged-in user as returned by login and `/me`.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub role: Role,
    /// Lets clients route unverified users to the code prompt.
    pub email_verified: bool,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            email_verified: user.is_verified(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub user_id: UserId,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ResendRequest {
    pub user_id: UserId,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetConfirm {
    pub user_id: UserId,
    pub token: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

const fn message(message: &'static str) -> Json<MessageResponse> {
    Json(MessageResponse { message })
}

// =============================================================================
// Registration and login
// =============================================================================

/// Create an unverified account and email its verification code.
///
/// POST /api/auth/register
#[instrument(skip(state, req), fields(email = %req.email))]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>> {
    let user = AuthService::new(state.pool())
        .register(&req.name, &req.email, &req.password, Role::User)
        .await?;

    // The account exists now; a delivery failure must not hide its id.
    let store = OtpRepository::new(state.pool());
    let sent = match OtpService::new(&store, state.email(), &state.config().base_url)
        .issue_email_verification(&user, Utc::now())
        .await
    {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(user_id = %user.id, error = %e, "Verification code not delivered");
            false
        }
    };

    Ok(Json(RegisterResponse::pending(&user, sent)))
}

/// Log in with email and password.
///
/// POST /api/auth/login
#[instrument(skip(state, session, req))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<LoginRequest>,
) -> Result<Json<UserResponse>> {
    let user = AuthService::new(state.pool())
        .login(&req.email, &req.password)
        .await?;

    set_current_user(&session, &CurrentUser::from(&user)).await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(UserResponse::from(&user)))
}

/// Log out.
///
/// POST /api/auth/logout
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<Json<MessageResponse>> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(message("Logged out"))
}

/// The logged-in user, re-read from the database.
///
/// GET /api/auth/me
#[instrument(skip(state, current), fields(user_id = %current.id))]
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<UserResponse>> {
    let user = AuthService::new(state.pool()).get_user(current.id).await?;
    Ok(Json(UserResponse::from(&user)))
}

// =============================================================================
// One-time codes
// =============================================================================

/// Check a verification code and mark the email verified.
///
/// POST /api/auth/verify-email
#[instrument(skip(state, req), fields(user_id = %req.user_id))]
pub async fn verify_email(
    State(state): State<AppState>,
    Json(req): Json<VerifyEmailRequest>,
) -> Result<Json<MessageResponse>> {
    let store = OtpRepository::new(state.pool());
    OtpService::new(&store, state.email(), &state.config().base_url)
        .verify_email(req.user_id, req.code.trim(), Utc::now())
        .await?;

    Ok(message("Email verified"))
}

/// Replace the verification code and email it again.
///
/// POST /api/auth/verify-email/resend
#[instrument(skip(state, req), fields(user_id = %req.user_id))]
pub async fn resend_verification(
    State(state): State<AppState>,
    Json(req): Json<ResendRequest>,
) -> Result<Json<MessageResponse>> {
    let user = UserRepository::new(state.pool())
        .get_by_id(req.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if user.is_verified() {
        return Err(AppError::BadRequest("Email already verified".to_string()));
    }

    let store = OtpRepository::new(state.pool());
    OtpService::new(&store, state.email(), &state.config().base_url)
        .issue_email_verification(&user, Utc::now())
        .await?;

    Ok(message("Verification code sent"))
}

/// Email a password reset link.
///
/// POST /api/auth/password-reset
#[instrument(skip(state, req))]
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(req): Json<PasswordResetRequest>,
) -> Result<Json<MessageResponse>> {
    let email =
        Email::parse(&req.email).map_err(|_| AppError::NotFound("User not found".to_string()))?;
    let user = UserRepository::new(state.pool())
        .get_by_email(&email)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let store = OtpRepository::new(state.pool());
    OtpService::new(&store, state.email(), &state.config().base_url)
        .issue_password_reset(&user, Utc::now())
        .await?;

    Ok(message("Password reset link sent"))
}

/// Set a new password with the emailed token.
///
/// POST /api/auth/password-reset/confirm
#[instrument(skip(state, req), fields(user_id = %req.user_id))]
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(req): Json<PasswordResetConfirm>,
) -> Result<Json<MessageResponse>> {
    validate_password(&req.password)?;

    let store = OtpRepository::new(state.pool());
    OtpService::new(&store, state.email(), &state.config().base_url)
        .reset_password(req.user_id, &req.token, &req.password, Utc::now())
        .await?;

    Ok(message("Password updated"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_pending_registration_keeps_user_id_when_mail_fails() {
        let now = Utc::now();
        let user = User {
            id: UserId::new(42),
            name: "Maria".to_string(),
            email: Email::parse("maria@example.com").unwrap(),
            email_verified: None,
            role: Role::User,
            created_at: now,
            updated_at: now,
        };

        let body = serde_json::to_value(RegisterResponse::pending(&user, false)).unwrap();
        assert_eq!(
            body,
            json!({
                "status": "pending",
                "user_id": 42,
                "email": "maria@example.com",
                "verification_sent": false,
            })
        );
    }
}
