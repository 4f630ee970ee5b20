//! Checkout route handlers (login required).

use axum::{Json, extract::State};
use tower_sessions::Session;
use tracing::instrument;

use crate::db::OrderRepository;
use crate::error::{Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::models::session::keys;
use crate::routes::auth::MessageResponse;
use crate::routes::cart::refresh_from_catalog;
use crate::services::cart::{open_cart, save_cart};
use crate::services::checkout::{CheckoutService, CheckoutSession};
use crate::state::AppState;

/// Create or refresh the payment intent for the session cart.
///
/// The cart is re-priced and clamped to current stock first; a cart left
/// empty by that is rejected.
///
/// POST /api/checkout/payment-intent
#[instrument(skip(state, session, user), fields(user_id = %user.id))]
pub async fn payment_intent(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Result<Json<CheckoutSession>> {
    let mut cart = open_cart(&session).await?;
    refresh_from_catalog(&state, &mut cart).await?;
    let items = cart.items().to_vec();
    save_cart(cart, &session).await?;

    let stored: Option<String> = session.get(keys::PAYMENT_INTENT_ID).await?;

    let orders = OrderRepository::new(state.pool());
    let checkout = CheckoutService::new(
        state.stripe(),
        &orders,
        &state.config().stripe.currency,
        state.stripe_retry(),
    )
    .sync_payment_intent(user.id, &items, stored.as_deref())
    .await?;

    session
        .insert(keys::PAYMENT_INTENT_ID, &checkout.payment_intent_id)
        .await?;
    add_breadcrumb(
        "checkout",
        "Payment intent synced",
        Some(&[("payment_intent_id", checkout.payment_intent_id.as_str())]),
    );

    Ok(Json(checkout))
}

/// Forget the cart and intent once the client has confirmed payment.
///
/// DELETE /api/checkout/payment-intent
#[instrument(skip(session, user), fields(user_id = %user.id))]
pub async fn complete(
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Result<Json<MessageResponse>> {
    let mut cart = open_cart(&session).await?;
    cart.clear()?;
    save_cart(cart, &session).await?;
    session.remove::<String>(keys::PAYMENT_INTENT_ID).await?;

    Ok(Json(MessageResponse {
        message: "Checkout completed",
    }))
}
