//! Product catalog repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use sqlx::types::Json;

use vitrine_core::{Page, PageRequest, ProductId};

use super::RepositoryError;
use crate::models::product::{NewProduct, Product, ProductImage};

const PRODUCT_SELECT: &str = r"
    SELECT p.id, p.name, p.description, p.price, p.brand, p.category, p.in_stock,
           p.images, p.created_at,
           (SELECT COUNT(*) FROM storefront.reviews r WHERE r.product_id = p.id) AS review_count
    FROM storefront.products p
";

/// Catalog sort order for `?sort=`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    PriceAsc,
    PriceDesc,
    #[default]
    Newest,
    Name,
    /// Most reviewed first.
    Rating,
}

impl ProductSort {
    const fn order_by(self) -> &'static str {
        match self {
            Self::PriceAsc => "p.price ASC, p.id ASC",
            Self::PriceDesc => "p.price DESC, p.id ASC",
            Self::Newest => "p.created_at DESC, p.id DESC",
            Self::Name => "p.name ASC, p.id ASC",
            Self::Rating => "review_count DESC, p.id ASC",
        }
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    description: String,
    price: Decimal,
    brand: String,
    category: String,
    in_stock: i32,
    images: Json<Vec<ProductImage>>,
    review_count: i64,
    created_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            brand: row.brand,
            category: row.category,
            in_stock: row.in_stock,
            images: row.images.0,
            review_count: row.review_count,
            created_at: row.created_at,
        }
    }
}

/// Escape `%`, `_` and `\` so user input matches literally in `LIKE`.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Repository for catalog reads and admin writes.
#[derive(Clone, Copy)]
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!("{PRODUCT_SELECT} WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row.map(Product::from))
    }

    /// Get every product in `ids` that still exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let raw: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let rows =
            sqlx::query_as::<_, ProductRow>(&format!("{PRODUCT_SELECT} WHERE p.id = ANY($1)"))
                .bind(raw)
                .fetch_all(self.pool)
                .await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// List products, optionally filtered by category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        category: Option<&str>,
        sort: ProductSort,
        page: PageRequest,
    ) -> Result<Page<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r"{PRODUCT_SELECT}
            WHERE ($1::text IS NULL OR p.category = $1)
            ORDER BY {}
            LIMIT $2 OFFSET $3
            ",
            sort.order_by()
        ))
        .bind(category)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let total: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM storefront.products WHERE ($1::text IS NULL OR category = $1)",
        )
        .bind(category)
        .fetch_one(self.pool)
        .await?;

        Ok(Page::new(
            rows.into_iter().map(Product::from).collect(),
            page,
            total.0,
        ))
    }

    /// Case-insensitive substring search over name, category, description and brand.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn search(
        &self,
        query: &str,
        page: PageRequest,
    ) -> Result<Page<Product>, RepositoryError> {
        let pattern = format!("%{}%", escape_like(query.trim()));
        let filter = r"
            p.name ILIKE $1 ESCAPE '\' OR p.category ILIKE $1 ESCAPE '\'
            OR p.description ILIKE $1 ESCAPE '\' OR p.brand ILIKE $1 ESCAPE '\'
        ";

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r"{PRODUCT_SELECT}
            WHERE {filter}
            ORDER BY p.created_at DESC, p.id DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(&pattern)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let total: (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM storefront.products p WHERE {filter}"
        ))
        .bind(&pattern)
        .fetch_one(self.pool)
        .await?;

        Ok(Page::new(
            rows.into_iter().map(Product::from).collect(),
            page,
            total.0,
        ))
    }

    /// Insert a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let (id,): (ProductId,) = sqlx::query_as(
            r"
            INSERT INTO storefront.products
                (name, description, price, brand, category, in_stock, images)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            ",
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(&product.brand)
        .bind(&product.category)
        .bind(product.in_stock)
        .bind(Json(&product.images))
        .fetch_one(self.pool)
        .await?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Replace every editable field of a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn update(
        &self,
        id: ProductId,
        product: &NewProduct,
    ) -> Result<Product, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.products
            SET name = $2, description = $3, price = $4, brand = $5, category = $6,
                in_stock = $7, images = $8, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(&product.brand)
        .bind(&product.category)
        .bind(product.in_stock)
        .bind(Json(&product.images))
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Delete a product and return it as it was.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn delete(&self, id: ProductId) -> Result<Product, RepositoryError> {
        let product = self.get(id).await?.ok_or(RepositoryError::NotFound)?;

        sqlx::query("DELETE FROM storefront.products WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(product)
    }

    /// Delete every product. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_all(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.products")
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("camisa"), "camisa");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b\\c"), "a\\_b\\\\c");
    }

    #[test]
    fn test_sort_deserialize() {
        let sort: ProductSort = serde_json::from_str("\"price_desc\"").unwrap_or_default();
        assert_eq!(sort, ProductSort::PriceDesc);
        assert_eq!(ProductSort::default(), ProductSort::Newest);
    }

    #[test]
    fn test_sort_rating_orders_by_review_count() {
        assert!(ProductSort::Rating.order_by().starts_with("review_count DESC"));
    }
}
