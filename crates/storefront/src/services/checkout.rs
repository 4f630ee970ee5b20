//! Payment intent negotiation and order upsert.
//!
//! A cart is paid through one gateway payment intent, and every intent has
//! exactly one order row holding the cart snapshot it was created or last
//! updated with. [`CheckoutService::sync_payment_intent`] keeps the two in
//! step each time the customer opens checkout; [`apply_webhook_event`] marks
//! the order paid once the gateway confirms the charge.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use vitrine_core::{CartItem, MoneyError, OrderId, UserId, to_minor_units};

use crate::db::RepositoryError;
use crate::models::order::{Address, NewOrder, Order};
use crate::services::retry::RetryPolicy;
use crate::stripe::webhook::WebhookEvent;
use crate::stripe::{PaymentIntent, StripeError};

/// Hosted payment gateway operations used by checkout.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create an intent for `amount` minor units.
    async fn create_intent(&self, amount: i64, currency: &str)
    -> Result<PaymentIntent, StripeError>;

    /// Look up an intent; `None` when the gateway doesn't know the id.
    async fn retrieve_intent(&self, id: &str) -> Result<Option<PaymentIntent>, StripeError>;

    /// Change the amount of an intent that is still awaiting payment.
    async fn update_intent_amount(&self, id: &str, amount: i64)
    -> Result<PaymentIntent, StripeError>;
}

/// Order persistence used by checkout and the webhook.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<Order>, RepositoryError>;

    /// Insert a pending order. The payment intent id is unique.
    async fn create(&self, order: &NewOrder) -> Result<Order, RepositoryError>;

    /// Replace amount and snapshot if the order is still pending at
    /// `expected_version`, otherwise `RepositoryError::Conflict`.
    async fn update_snapshot(
        &self,
        id: OrderId,
        expected_version: i32,
        amount: i64,
        products: &[CartItem],
    ) -> Result<Order, RepositoryError>;

    /// Delete a pending order still at `expected_version`, otherwise
    /// `RepositoryError::Conflict`.
    async fn discard_pending(
        &self,
        id: OrderId,
        expected_version: i32,
    ) -> Result<(), RepositoryError>;

    /// Mark the order of `payment_intent_id` paid, attaching `address` when
    /// given.
    async fn mark_paid(
        &self,
        payment_intent_id: &str,
        address: Option<&Address>,
    ) -> Result<Order, RepositoryError>;
}

/// Errors from the checkout flow.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Payment gateway error: {0}")]
    Gateway(#[from] StripeError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// What the browser needs to confirm the payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutSession {
    pub payment_intent_id: String,
    pub client_secret: String,
    /// Minor units.
    pub amount: i64,
    pub currency: String,
    pub order_id: OrderId,
}

impl CheckoutSession {
    fn new(intent: PaymentIntent, order: &Order) -> Result<Self, CheckoutError> {
        let client_secret = intent.client_secret.ok_or_else(|| {
            CheckoutError::Gateway(StripeError::Parse(
                "payment intent has no client secret".to_string(),
            ))
        })?;
        Ok(Self {
            payment_intent_id: intent.id,
            client_secret,
            amount: intent.amount,
            currency: intent.currency,
            order_id: order.id,
        })
    }
}

/// Sum of line totals in minor units.
///
/// # Errors
///
/// Returns `MoneyError` if the total is negative or overflows.
pub fn cart_amount(items: &[CartItem]) -> Result<i64, MoneyError> {
    let total: Decimal = items.iter().map(|item| item.total).sum();
    to_minor_units(total)
}

/// Checkout over a payment gateway and an order store.
pub struct CheckoutService<'a, G, O> {
    gateway: &'a G,
    orders: &'a O,
    currency: &'a str,
    retry: RetryPolicy,
}

impl<'a, G: PaymentGateway, O: OrderStore> CheckoutService<'a, G, O> {
    /// Create a checkout service charging in `currency`.
    #[must_use]
    pub const fn new(gateway: &'a G, orders: &'a O, currency: &'a str, retry: RetryPolicy) -> Self {
        Self {
            gateway,
            orders,
            currency,
            retry,
        }
    }

    /// Make sure a payment intent and a pending order match the cart.
    ///
    /// With no `stored_intent_id`, or one that can no longer be reused, a new
    /// intent and order are created. Otherwise the stored intent's amount and
    /// its order's snapshot are updated in place.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` for an empty cart, `Gateway` when the
    /// gateway fails, and `Repository` (including `Conflict` when a concurrent
    /// write changed the order) when persistence fails.
    #[instrument(skip(self, items), fields(user_id = %user_id, lines = items.len()))]
    pub async fn sync_payment_intent(
        &self,
        user_id: UserId,
        items: &[CartItem],
        stored_intent_id: Option<&str>,
    ) -> Result<CheckoutSession, CheckoutError> {
        if items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let amount = cart_amount(items)?;

        if let Some(intent_id) = stored_intent_id {
            if let Some(session) = self.reuse_intent(user_id, intent_id, items, amount).await? {
                return Ok(session);
            }
        }

        self.create_intent_and_order(user_id, items, amount).await
    }

    /// Update a stored intent and its order, or `None` if the intent is stale.
    async fn reuse_intent(
        &self,
        user_id: UserId,
        intent_id: &str,
        items: &[CartItem],
        amount: i64,
    ) -> Result<Option<CheckoutSession>, CheckoutError> {
        let retrieved = self
            .retry
            .run(
                || self.gateway.retrieve_intent(intent_id),
                StripeError::is_transient,
            )
            .await?;

        let Some(intent) = retrieved else {
            warn!(payment_intent_id = %intent_id, "Stored payment intent unknown to gateway, replacing");
            return Ok(None);
        };

        if !intent.status.is_updatable() {
            warn!(
                payment_intent_id = %intent_id,
                status = ?intent.status,
                "Stored payment intent can no longer be updated, replacing"
            );
            return Ok(None);
        }

        let existing = self.orders.find_by_payment_intent(intent_id).await?;
        if let Some(order) = &existing {
            if order.is_paid() {
                warn!(order_id = %order.id, "Order for stored payment intent already paid, replacing");
                return Ok(None);
            }
            if order.user_id != user_id {
                warn!(order_id = %order.id, "Stored payment intent belongs to another user, replacing");
                return Ok(None);
            }
        }

        // The order is written first: a concurrent write fails here with
        // `Conflict` before the gateway amount moves.
        let order = match &existing {
            Some(order) => {
                self.orders
                    .update_snapshot(order.id, order.version, amount, items)
                    .await?
            }
            None => {
                self.orders
                    .create(&self.new_order(user_id, intent_id, amount, items))
                    .await?
            }
        };

        let updated = self
            .retry
            .run(
                || self.gateway.update_intent_amount(intent_id, amount),
                StripeError::is_transient,
            )
            .await;
        let intent = match updated {
            Ok(intent) => intent,
            Err(e) => {
                self.roll_back(&order, existing.as_ref()).await;
                return Err(e.into());
            }
        };

        info!(order_id = %order.id, amount, "Payment intent updated");
        CheckoutSession::new(intent, &order).map(Some)
    }

    /// Undo an order write whose gateway update failed, so the order keeps
    /// matching the amount the intent still carries.
    async fn roll_back(&self, written: &Order, previous: Option<&Order>) {
        let result = match previous {
            Some(previous) => self
                .orders
                .update_snapshot(written.id, written.version, previous.amount, &previous.products)
                .await
                .map(|_| ()),
            None => {
                self.orders
                    .discard_pending(written.id, written.version)
                    .await
            }
        };
        if let Err(e) = result {
            error!(order_id = %written.id, error = %e, "Failed to roll back order after gateway error");
        }
    }

    async fn create_intent_and_order(
        &self,
        user_id: UserId,
        items: &[CartItem],
        amount: i64,
    ) -> Result<CheckoutSession, CheckoutError> {
        let intent = self
            .retry
            .run(
                || self.gateway.create_intent(amount, self.currency),
                StripeError::is_transient,
            )
            .await?;

        let order = self
            .orders
            .create(&self.new_order(user_id, &intent.id, amount, items))
            .await?;

        info!(order_id = %order.id, payment_intent_id = %intent.id, amount, "Payment intent created");
        CheckoutSession::new(intent, &order)
    }

    fn new_order(
        &self,
        user_id: UserId,
        payment_intent_id: &str,
        amount: i64,
        items: &[CartItem],
    ) -> NewOrder {
        NewOrder {
            user_id,
            amount,
            currency: self.currency.to_string(),
            payment_intent_id: payment_intent_id.to_string(),
            products: items.to_vec(),
        }
    }
}

/// Apply a verified webhook event to the order store.
///
/// Returns the paid order for `charge.succeeded`, `None` for events that need
/// no action or whose payment intent has no order here.
///
/// # Errors
///
/// Returns `RepositoryError` if the update fails.
pub async fn apply_webhook_event<O: OrderStore>(
    orders: &O,
    event: &WebhookEvent,
) -> Result<Option<Order>, RepositoryError> {
    match event {
        WebhookEvent::ChargeSucceeded {
            event_id,
            payment_intent_id,
            address,
        } => match orders.mark_paid(payment_intent_id, address.as_ref()).await {
            Ok(order) => {
                info!(
                    event_id = %event_id,
                    order_id = %order.id,
                    payment_intent_id = %payment_intent_id,
                    "Order marked paid"
                );
                Ok(Some(order))
            }
            Err(RepositoryError::NotFound) => {
                warn!(
                    event_id = %event_id,
                    payment_intent_id = %payment_intent_id,
                    "Charge succeeded for unknown payment intent"
                );
                Ok(None)
            }
            Err(e) => Err(e),
        },
        WebhookEvent::Ignored { event_id, kind } => {
            info!(event_id = %event_id, kind = %kind, "Unhandled webhook event type");
            Ok(None)
        }
    }
}
