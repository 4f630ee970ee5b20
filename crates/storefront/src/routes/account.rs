//! Account route handlers (login required).

use axum::{Json, extract::State};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::db::OrderRepository;
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::{CurrentUser, Order, session::keys};
use crate::routes::auth::{MessageResponse, UserResponse};
use crate::services::auth::AuthService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateNameRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub password: String,
    pub new_password: String,
    pub confirm_new_password: String,
}

/// Change the display name.
///
/// PUT /api/account/name
#[instrument(skip(state, session, current, req), fields(user_id = %current.id))]
pub async fn update_name(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(current): RequireAuth,
    Json(req): Json<UpdateNameRequest>,
) -> Result<Json<UserResponse>> {
    let user = AuthService::new(state.pool())
        .update_name(current.id, &req.name)
        .await?;

    // Keep the session copy in step with the new name.
    session
        .insert(keys::CURRENT_USER, CurrentUser::from(&user))
        .await?;

    Ok(Json(UserResponse::from(&user)))
}

/// Change the password after checking the current one.
///
/// PUT /api/account/password
#[instrument(skip(state, current, req), fields(user_id = %current.id))]
pub async fn change_password(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>> {
    AuthService::new(state.pool())
        .change_password(
            current.id,
            &req.password,
            &req.new_password,
            &req.confirm_new_password,
        )
        .await?;

    Ok(Json(MessageResponse {
        message: "Password updated",
    }))
}

/// The caller's orders, newest first.
///
/// GET /api/account/orders
#[instrument(skip(state, current), fields(user_id = %current.id))]
pub async fn orders(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(current.id)
        .await?;
    Ok(Json(orders))
}
