//! Order types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vitrine_core::{CartItem, DeliveryStatus, OrderId, PaymentStatus, UserId};

/// Shipping address reported by the payment gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub line1: String,
    pub line2: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

/// An order, one per payment intent.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    /// Total in minor units, equal to the snapshot's total at last sync.
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub delivery_status: DeliveryStatus,
    pub payment_intent_id: String,
    /// Cart lines at last sync.
    pub products: Vec<CartItem>,
    pub address: Option<Address>,
    /// Bumped on every write; checked by snapshot updates.
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Whether the gateway has confirmed payment.
    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.status == PaymentStatus::Paid
    }
}

/// Fields for a new pending order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub amount: i64,
    pub currency: String,
    pub payment_intent_id: String,
    pub products: Vec<CartItem>,
}
