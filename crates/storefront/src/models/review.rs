//! Product review types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use vitrine_core::{ProductId, ReviewId, UserId};

/// A review, with the author's display name.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub user_name: String,
    pub rating: i16,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}
