//! Admin dashboard handlers.
//!
//! Every handler takes [`RequireAdmin`], which re-checks the role against
//! the database on each request.

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::Utc;
use serde::Deserialize;
use tracing::instrument;

use vitrine_core::{DeliveryStatus, OrderId, ProductId};

use crate::db::stats::{SalesPoint, Summary};
use crate::db::{OrderRepository, ProductRepository, RepositoryError, StatsRepository, UserRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{NewProduct, Order, Product, User};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DeliveryStatusRequest {
    pub delivery_status: DeliveryStatus,
}

// =============================================================================
// Dashboard
// =============================================================================

/// GET /api/admin/summary
#[instrument(skip_all)]
pub async fn summary(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Summary>> {
    Ok(Json(StatsRepository::new(state.pool()).summary().await?))
}

/// Daily paid sales for the last seven full days.
///
/// GET /api/admin/sales-chart
#[instrument(skip_all)]
pub async fn sales_chart(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<SalesPoint>>> {
    let points = StatsRepository::new(state.pool())
        .sales_chart(Utc::now().date_naive())
        .await?;
    Ok(Json(points))
}

/// GET /api/admin/users
#[instrument(skip_all)]
pub async fn users(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<User>>> {
    Ok(Json(UserRepository::new(state.pool()).list().await?))
}

// =============================================================================
// Orders
// =============================================================================

/// All orders, newest first.
///
/// GET /api/admin/orders
#[instrument(skip_all)]
pub async fn orders(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(OrderRepository::new(state.pool()).list().await?))
}

/// Move a paid order along its delivery states.
///
/// PATCH /api/admin/orders/{id}/delivery-status
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn set_delivery_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(req): Json<DeliveryStatusRequest>,
) -> Result<Json<Order>> {
    let order = OrderRepository::new(state.pool())
        .set_delivery_status(id, req.delivery_status)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AppError::NotFound("Order not found".to_string()),
            RepositoryError::Conflict(_) => {
                AppError::BadRequest("Order has not been paid".to_string())
            }
            other => AppError::Database(other),
        })?;

    tracing::info!(
        order_id = %order.id,
        delivery_status = order.delivery_status.as_str(),
        "Delivery status updated"
    );
    Ok(Json(order))
}

// =============================================================================
// Products
// =============================================================================

fn validated(product: NewProduct) -> Result<NewProduct> {
    product.validate().map_err(AppError::BadRequest)?;
    Ok(product)
}

fn product_not_found(e: RepositoryError) -> AppError {
    match e {
        RepositoryError::NotFound => AppError::NotFound("Product not found".to_string()),
        other => AppError::Database(other),
    }
}

/// POST /api/admin/products
#[instrument(skip(state, admin, req), fields(admin_id = %admin.id))]
pub async fn create_product(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(req): Json<NewProduct>,
) -> Result<Json<Product>> {
    let product = ProductRepository::new(state.pool())
        .create(&validated(req)?)
        .await?;
    tracing::info!(product_id = %product.id, "Product created");
    Ok(Json(product))
}

/// PUT /api/admin/products/{id}
#[instrument(skip(state, admin, req), fields(admin_id = %admin.id))]
pub async fn update_product(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(req): Json<NewProduct>,
) -> Result<Json<Product>> {
    let product = ProductRepository::new(state.pool())
        .update(id, &validated(req)?)
        .await
        .map_err(product_not_found)?;
    Ok(Json(product))
}

/// Delete a product and return it. Hosted images are left alone.
///
/// DELETE /api/admin/products/{id}
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete_product(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    let product = ProductRepository::new(state.pool())
        .delete(id)
        .await
        .map_err(product_not_found)?;
    tracing::info!(product_id = %product.id, "Product deleted");
    Ok(Json(product))
}
