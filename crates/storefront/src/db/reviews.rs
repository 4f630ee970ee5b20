//! Product review repository.

use sqlx::PgPool;

use vitrine_core::{ProductId, ReviewId, UserId};

use super::RepositoryError;
use crate::models::review::Review;

/// Repository for product reviews.
#[derive(Clone, Copy)]
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    /// Create a new review repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Reviews of a product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<Review>, RepositoryError> {
        let reviews = sqlx::query_as::<_, Review>(
            r"
            SELECT r.id, r.product_id, r.user_id, u.name AS user_name,
                   r.rating, r.comment, r.created_at
            FROM storefront.reviews r
            JOIN storefront.users u ON u.id = r.user_id
            WHERE r.product_id = $1
            ORDER BY r.created_at DESC
            ",
        )
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;
        Ok(reviews)
    }

    /// Store a review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        product_id: ProductId,
        user_id: UserId,
        rating: i16,
        comment: &str,
    ) -> Result<Review, RepositoryError> {
        let (id,): (ReviewId,) = sqlx::query_as(
            r"
            INSERT INTO storefront.reviews (product_id, user_id, rating, comment)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(product_id)
        .bind(user_id)
        .bind(rating)
        .bind(comment)
        .fetch_one(self.pool)
        .await?;

        sqlx::query_as::<_, Review>(
            r"
            SELECT r.id, r.product_id, r.user_id, u.name AS user_name,
                   r.rating, r.comment, r.created_at
            FROM storefront.reviews r
            JOIN storefront.users u ON u.id = r.user_id
            WHERE r.id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }
}
