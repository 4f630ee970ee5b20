//! Catalog types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use vitrine_core::ProductId;

/// One colour variant's picture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    /// Colour name, as shown to shoppers.
    pub color: String,
    /// Hex colour code for the swatch.
    pub color_code: String,
    /// Image URL.
    pub image: String,
}

/// A catalog product.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    /// Unit price in major units.
    pub price: Decimal,
    pub brand: String,
    pub category: String,
    pub in_stock: i32,
    pub images: Vec<ProductImage>,
    /// Number of reviews, used for the "rating" sort.
    pub review_count: i64,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Image for `color`, falling back to the first image.
    #[must_use]
    pub fn image_for(&self, color: &str) -> Option<&ProductImage> {
        self.images
            .iter()
            .find(|img| img.color == color)
            .or_else(|| self.images.first())
    }

    /// Whether `color` is one of the product's variants.
    #[must_use]
    pub fn has_color(&self, color: &str) -> bool {
        self.images.iter().any(|img| img.color == color)
    }
}

/// Fields for creating or replacing a product.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub brand: String,
    pub category: String,
    pub in_stock: i32,
    pub images: Vec<ProductImage>,
}

impl NewProduct {
    /// Check the invariants enforced before writing.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message for the first failed rule.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Name is required".to_string());
        }
        if self.category.trim().is_empty() {
            return Err("Category is required".to_string());
        }
        if self.price.is_sign_negative() {
            return Err("Price cannot be negative".to_string());
        }
        if self.in_stock < 0 {
            return Err("Stock cannot be negative".to_string());
        }
        if self.images.is_empty() {
            return Err("At least one image is required".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_product() -> NewProduct {
        NewProduct {
            name: "Camiseta".to_string(),
            description: "Algodão".to_string(),
            price: Decimal::new(4990, 2),
            brand: "Vitrine".to_string(),
            category: "camisetas".to_string(),
            in_stock: 3,
            images: vec![ProductImage {
                color: "azul".to_string(),
                color_code: "#0000ff".to_string(),
                image: "https://img.example.com/azul.png".to_string(),
            }],
        }
    }

    #[test]
    fn test_validate_accepts_valid_product() {
        assert!(new_product().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_fields() {
        let mut p = new_product();
        p.name = "  ".to_string();
        assert!(p.validate().is_err());

        let mut p = new_product();
        p.price = Decimal::new(-1, 0);
        assert!(p.validate().is_err());

        let mut p = new_product();
        p.in_stock = -1;
        assert!(p.validate().is_err());

        let mut p = new_product();
        p.images.clear();
        assert_eq!(
            p.validate(),
            Err("At least one image is required".to_string())
        );
    }
}
