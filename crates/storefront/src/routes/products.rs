//! Catalog and review route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use vitrine_core::{Page, PageRequest, ProductId};

use crate::db::products::ProductSort;
use crate::db::{OrderRepository, ProductRepository, ReviewRepository};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::models::{Product, Review};
use crate::state::AppState;

/// Accepted review ratings.
pub const RATING_RANGE: std::ops::RangeInclusive<i16> = 1..=5;

/// Query parameters for the catalog listing.
///
/// Paging fields are spelled out rather than flattened: `serde_urlencoded`
/// can't parse numbers through `#[serde(flatten)]`.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub category: Option<String>,
    #[serde(default)]
    pub sort: ProductSort,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

fn page_request(page: Option<u32>, per_page: Option<u32>) -> PageRequest {
    PageRequest::new(
        page.unwrap_or(1),
        per_page.unwrap_or(PageRequest::DEFAULT_PER_PAGE),
    )
}

#[derive(Debug, Serialize)]
pub struct ProductDetail {
    pub product: Product,
    pub reviews: Vec<Review>,
    /// Whether the caller has a delivered order containing this product.
    pub can_review: bool,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub rating: i16,
    #[serde(default)]
    pub comment: String,
}

fn validate_rating(rating: i16) -> Result<()> {
    if RATING_RANGE.contains(&rating) {
        Ok(())
    } else {
        Err(AppError::BadRequest(
            "Rating must be between 1 and 5".to_string(),
        ))
    }
}

/// Paginated catalog.
///
/// GET /api/products?category=&sort=&page=&per_page=
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<Product>>> {
    let category = query
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    let page = ProductRepository::new(state.pool())
        .list(category, query.sort, page_request(query.page, query.per_page))
        .await?;
    Ok(Json(page))
}

/// Case-insensitive substring search.
///
/// GET /api/products/search?q=
#[instrument(skip(state))]
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Page<Product>>> {
    let page = ProductRepository::new(state.pool())
        .search(&query.q, page_request(query.page, query.per_page))
        .await?;
    Ok(Json(page))
}

async fn load_product(state: &AppState, id: ProductId) -> Result<Product> {
    ProductRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
}

/// Product with its reviews.
///
/// GET /api/products/{id}
#[instrument(skip(state, user))]
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Path(id): Path<ProductId>,
) -> Result<Json<ProductDetail>> {
    let product = load_product(&state, id).await?;
    let reviews = ReviewRepository::new(state.pool())
        .list_for_product(id)
        .await?;

    let can_review = match user {
        Some(user) => {
            OrderRepository::new(state.pool())
                .has_delivered_product(user.id, id)
                .await?
        }
        None => false,
    };

    Ok(Json(ProductDetail {
        product,
        reviews,
        can_review,
    }))
}

/// Review a product the caller has received.
///
/// POST /api/products/{id}/reviews
#[instrument(skip(state, user, req), fields(user_id = %user.id))]
pub async fn create_review(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<ProductId>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<Review>> {
    validate_rating(req.rating)?;
    load_product(&state, id).await?;

    let delivered = OrderRepository::new(state.pool())
        .has_delivered_product(user.id, id)
        .await?;
    if !delivered {
        return Err(AppError::Forbidden(
            "Only customers who received this product can review it".to_string(),
        ));
    }

    let review = ReviewRepository::new(state.pool())
        .create(id, user.id, req.rating, req.comment.trim())
        .await?;

    let product_id = id.to_string();
    add_breadcrumb(
        "review",
        "Review created",
        Some(&[("product_id", product_id.as_str())]),
    );
    Ok(Json(review))
}
