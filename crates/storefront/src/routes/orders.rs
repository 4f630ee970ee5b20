//! Order read handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use tracing::instrument;

use vitrine_core::OrderId;

use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::{CurrentUser, Order};
use crate::state::AppState;

/// Owners see their own orders, admins see all.
fn can_view(user: &CurrentUser, order: &Order) -> bool {
    order.user_id == user.id || user.role.is_admin()
}

/// GET /api/orders/{id}
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    let order = OrderRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

    // Same answer as a missing order, so ids can't be probed.
    if !can_view(&user, &order) {
        return Err(AppError::NotFound("Order not found".to_string()));
    }

    Ok(Json(order))
}
