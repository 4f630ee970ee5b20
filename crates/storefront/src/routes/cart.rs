//! Cart route handlers.
//!
//! The cart lives in the session. Each handler opens it, applies its
//! mutations through [`CartStore`], reconciles, and writes it back once.

use axum::{
    Json,
    extract::{Path, State},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;
use uuid::Uuid;

use vitrine_core::{CartItem, CartStore, ProductId};

use crate::db::ProductRepository;
use crate::error::{Result, add_breadcrumb};
use crate::services::cart::{
    CartLineError, SessionCartStorage, line_for, open_cart, product_ids, save_cart,
    sync_with_catalog,
};
use crate::state::AppState;

/// Cart display data.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub items: Vec<CartItem>,
    pub subtotal: Decimal,
    pub item_count: i32,
}

impl<S: vitrine_core::CartStorage> From<&CartStore<S>> for CartView {
    fn from(cart: &CartStore<S>) -> Self {
        Self {
            items: cart.items().to_vec(),
            subtotal: cart.subtotal(),
            item_count: cart.items().iter().map(|i| i.quantity).sum(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    pub color: String,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

const fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct SetQuantityRequest {
    pub quantity: i32,
}

/// Reconcile, persist, and render.
async fn finish(mut cart: CartStore<SessionCartStorage>, session: &Session) -> Result<Json<CartView>> {
    cart.reconcile()?;
    let view = CartView::from(&cart);
    save_cart(cart, session).await?;
    Ok(Json(view))
}

/// Re-read price and stock of every product in `cart` from the catalog.
pub(crate) async fn refresh_from_catalog(
    state: &AppState,
    cart: &mut CartStore<SessionCartStorage>,
) -> Result<()> {
    if cart.is_empty() {
        return Ok(());
    }

    let catalog = ProductRepository::new(state.pool())
        .get_many(&product_ids(cart.items()))
        .await?;
    let removed = sync_with_catalog(cart, &catalog)?;
    if removed > 0 {
        tracing::info!(removed, "Dropped cart lines with no stock");
    }
    Ok(())
}

/// Current cart, refreshed against the catalog.
///
/// GET /api/cart
#[instrument(skip(state, session))]
pub async fn show(State(state): State<AppState>, session: Session) -> Result<Json<CartView>> {
    let mut cart = open_cart(&session).await?;
    refresh_from_catalog(&state, &mut cart).await?;
    finish(cart, &session).await
}

/// Add a product in a colour.
///
/// POST /api/cart/items
#[instrument(skip(state, session, req), fields(product_id = %req.product_id))]
pub async fn add_item(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<CartView>> {
    let product = ProductRepository::new(state.pool())
        .get(req.product_id)
        .await?
        .ok_or(CartLineError::ProductNotFound)?;

    let line = line_for(&product, &req.color, req.quantity)?;

    let mut cart = open_cart(&session).await?;
    cart.add(line)?;

    let product_id = req.product_id.to_string();
    add_breadcrumb(
        "cart",
        "Added item",
        Some(&[("product_id", product_id.as_str())]),
    );
    finish(cart, &session).await
}

/// Set a line's quantity. Zero or less removes the line.
///
/// PATCH /api/cart/items/{id}
#[instrument(skip(session, req))]
pub async fn set_quantity(
    session: Session,
    Path(id): Path<Uuid>,
    Json(req): Json<SetQuantityRequest>,
) -> Result<Json<CartView>> {
    let mut cart = open_cart(&session).await?;
    cart.set_quantity(id, req.quantity)?;
    finish(cart, &session).await
}

/// POST /api/cart/items/{id}/increment
#[instrument(skip(session))]
pub async fn increment(session: Session, Path(id): Path<Uuid>) -> Result<Json<CartView>> {
    let mut cart = open_cart(&session).await?;
    cart.increment(id)?;
    finish(cart, &session).await
}

/// POST /api/cart/items/{id}/decrement
#[instrument(skip(session))]
pub async fn decrement(session: Session, Path(id): Path<Uuid>) -> Result<Json<CartView>> {
    let mut cart = open_cart(&session).await?;
    cart.decrement(id)?;
    finish(cart, &session).await
}

/// DELETE /api/cart/items/{id}
#[instrument(skip(session))]
pub async fn remove_item(session: Session, Path(id): Path<Uuid>) -> Result<Json<CartView>> {
    let mut cart = open_cart(&session).await?;
    cart.remove(id)?;
    finish(cart, &session).await
}

/// Empty the cart.
///
/// DELETE /api/cart
#[instrument(skip(session))]
pub async fn clear(session: Session) -> Result<Json<CartView>> {
    let mut cart = open_cart(&session).await?;
    cart.clear()?;
    finish(cart, &session).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use vitrine_core::{MemoryCartStorage, NewCartItem};

    use super::*;

    #[test]
    fn test_cart_view_counts_units() {
        let mut cart = CartStore::open(MemoryCartStorage::default()).unwrap();
        cart.add(NewCartItem {
            product_id: ProductId::new(1),
            name: "Camiseta".to_string(),
            price: Decimal::new(4990, 2),
            quantity: 2,
            color: "Preto".to_string(),
            image_url: String::new(),
            in_stock: 10,
        })
        .unwrap();
        cart.add(NewCartItem {
            product_id: ProductId::new(2),
            name: "Boné".to_string(),
            price: Decimal::new(2500, 2),
            quantity: 1,
            color: "Azul".to_string(),
            image_url: String::new(),
            in_stock: 10,
        })
        .unwrap();

        let view = CartView::from(&cart);
        assert_eq!(view.item_count, 3);
        assert_eq!(view.subtotal, Decimal::new(12480, 2));
        assert_eq!(view.items.len(), 2);
    }

    #[test]
    fn test_add_request_defaults_quantity() {
        let req: AddItemRequest =
            serde_json::from_str(r#"{"product_id": 7, "color": "Preto"}"#).unwrap();
        assert_eq!(req.quantity, 1);
        assert_eq!(req.product_id, ProductId::new(7));
    }
}
