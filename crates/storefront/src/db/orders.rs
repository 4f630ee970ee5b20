//! Order repository.
//!
//! Orders are keyed by payment intent id. Snapshot updates use optimistic
//! concurrency on `version`; payment confirmation from the webhook always
//! applies and bumps the version, so a checkout sync racing a webhook loses
//! instead of overwriting a paid order.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use vitrine_core::{CartItem, DeliveryStatus, OrderId, PaymentStatus, ProductId, UserId};

use super::RepositoryError;
use crate::models::order::{Address, NewOrder, Order};
use crate::services::checkout::OrderStore;

const ORDER_COLUMNS: &str = r"
    id, user_id, amount, currency, status, delivery_status, payment_intent_id,
    products, address, version, created_at, updated_at
";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    amount: i64,
    currency: String,
    status: PaymentStatus,
    delivery_status: DeliveryStatus,
    payment_intent_id: String,
    products: Json<Vec<CartItem>>,
    address: Option<Json<Address>>,
    version: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            amount: row.amount,
            currency: row.currency,
            status: row.status,
            delivery_status: row.delivery_status,
            payment_intent_id: row.payment_intent_id,
            products: row.products.0,
            address: row.address.map(|a| a.0),
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for orders.
#[derive(Clone, Copy)]
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Order::from))
    }

    /// Orders of a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM storefront.orders
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Order::from).collect())
    }

    /// All orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.orders ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Order::from).collect())
    }

    /// Set the delivery status of a paid order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    /// Returns `RepositoryError::Conflict` if the order is not paid yet.
    pub async fn set_delivery_status(
        &self,
        id: OrderId,
        delivery_status: DeliveryStatus,
    ) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            UPDATE storefront.orders
            SET delivery_status = $2, version = version + 1, updated_at = now()
            WHERE id = $1 AND status = $3
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(delivery_status)
        .bind(PaymentStatus::Paid)
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(row) => Ok(row.into()),
            None if self.get(id).await?.is_some() => {
                Err(RepositoryError::Conflict("order is not paid".to_owned()))
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    /// Whether any delivered order of `user_id` contains `product_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn has_delivered_product(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let row: (bool,) = sqlx::query_as(
            r"
            SELECT EXISTS(
                SELECT 1 FROM storefront.orders o,
                     jsonb_array_elements(o.products) AS item
                WHERE o.user_id = $1
                  AND o.delivery_status = $2
                  AND (item ->> 'product_id')::int = $3
            )
            ",
        )
        .bind(user_id)
        .bind(DeliveryStatus::Delivered)
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;
        Ok(row.0)
    }
}

#[async_trait]
impl OrderStore for OrderRepository<'_> {
    async fn find_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.orders WHERE payment_intent_id = $1"
        ))
        .bind(payment_intent_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Order::from))
    }

    async fn create(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            INSERT INTO storefront.orders
                (user_id, amount, currency, payment_intent_id, products)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(order.user_id)
        .bind(order.amount)
        .bind(&order.currency)
        .bind(&order.payment_intent_id)
        .bind(Json(&order.products))
        .fetch_one(self.pool)
        .await
        .map_err(|e| super::conflict_on_unique(e, "payment intent already has an order"))?;
        Ok(row.into())
    }

    async fn update_snapshot(
        &self,
        id: OrderId,
        expected_version: i32,
        amount: i64,
        products: &[CartItem],
    ) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            UPDATE storefront.orders
            SET amount = $3, products = $4, version = version + 1, updated_at = now()
            WHERE id = $1 AND version = $2 AND status = $5
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(expected_version)
        .bind(amount)
        .bind(Json(products))
        .bind(PaymentStatus::Pending)
        .fetch_optional(self.pool)
        .await?;

        row.map(Order::from).ok_or_else(|| {
            RepositoryError::Conflict(format!(
                "order {id} changed since version {expected_version}"
            ))
        })
    }

    async fn discard_pending(
        &self,
        id: OrderId,
        expected_version: i32,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM storefront.orders WHERE id = $1 AND version = $2 AND status = $3",
        )
        .bind(id)
        .bind(expected_version)
        .bind(PaymentStatus::Pending)
        .execute(self.pool)
        .await?;

        if result.rows_affected() != 1 {
            return Err(RepositoryError::Conflict(format!(
                "order {id} changed since version {expected_version}"
            )));
        }
        Ok(())
    }

    async fn mark_paid(
        &self,
        payment_intent_id: &str,
        address: Option<&Address>,
    ) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            UPDATE storefront.orders
            SET status = $2,
                address = COALESCE($3, address),
                version = version + 1,
                updated_at = now()
            WHERE payment_intent_id = $1
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(payment_intent_id)
        .bind(PaymentStatus::Paid)
        .bind(address.map(Json))
        .fetch_optional(self.pool)
        .await?;

        row.map(Order::from).ok_or(RepositoryError::NotFound)
    }
}
