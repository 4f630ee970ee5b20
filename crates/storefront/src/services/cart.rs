//! Session-backed cart.
//!
//! [`CartStore`] is synchronous, the session is not. [`SessionCartStorage`]
//! buffers the lines loaded from the session, collects every save the store
//! makes, and [`save_cart`] writes the final list back once the handler is
//! done mutating.

use std::collections::HashMap;

use thiserror::Error;
use tower_sessions::Session;

use vitrine_core::{CartError, CartItem, CartStorage, CartStore, NewCartItem, ProductId};

use crate::models::product::Product;
use crate::models::session::keys;

/// Errors resolving a product into a cart line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartLineError {
    #[error("Product not found")]
    ProductNotFound,

    #[error("Color {0} is not available for this product")]
    UnknownColor(String),

    #[error("Quantity must be at least 1")]
    InvalidQuantity,

    #[error("Product is out of stock")]
    OutOfStock,
}

/// [`CartStorage`] over a buffered copy of the session's cart.
#[derive(Debug, Default)]
pub struct SessionCartStorage {
    items: Vec<CartItem>,
    dirty: bool,
}

impl SessionCartStorage {
    /// Read the cart from the session.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Storage` if the session can't be read.
    pub async fn load_from(session: &Session) -> Result<Self, CartError> {
        let items = session
            .get::<Vec<CartItem>>(keys::CART_ITEMS)
            .await
            .map_err(|e| CartError::Storage(e.to_string()))?
            .unwrap_or_default();
        Ok(Self {
            items,
            dirty: false,
        })
    }

    /// Write the buffered lines back if the store saved anything.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Storage` if the session can't be written.
    pub async fn flush(self, session: &Session) -> Result<(), CartError> {
        if !self.dirty {
            return Ok(());
        }
        session
            .insert(keys::CART_ITEMS, &self.items)
            .await
            .map_err(|e| CartError::Storage(e.to_string()))
    }
}

impl CartStorage for SessionCartStorage {
    fn load(&self) -> Result<Vec<CartItem>, CartError> {
        Ok(self.items.clone())
    }

    fn save(&mut self, items: &[CartItem]) -> Result<(), CartError> {
        self.items = items.to_vec();
        self.dirty = true;
        Ok(())
    }
}

/// Open the cart stored in `session`.
///
/// # Errors
///
/// Returns `CartError::Storage` if the session can't be read.
pub async fn open_cart(session: &Session) -> Result<CartStore<SessionCartStorage>, CartError> {
    let storage = SessionCartStorage::load_from(session).await?;
    CartStore::open(storage)
}

/// Persist `cart` into `session`.
///
/// # Errors
///
/// Returns `CartError::Storage` if the session can't be written.
pub async fn save_cart(
    cart: CartStore<SessionCartStorage>,
    session: &Session,
) -> Result<(), CartError> {
    cart.into_storage().flush(session).await
}

/// Build the line to add for `product` in `color`.
///
/// # Errors
///
/// Returns `CartLineError` if the colour isn't offered, the quantity is not
/// positive, or the product is sold out.
pub fn line_for(
    product: &Product,
    color: &str,
    quantity: i32,
) -> Result<NewCartItem, CartLineError> {
    if quantity < 1 {
        return Err(CartLineError::InvalidQuantity);
    }
    if !product.has_color(color) {
        return Err(CartLineError::UnknownColor(color.to_string()));
    }
    if product.in_stock <= 0 {
        return Err(CartLineError::OutOfStock);
    }

    let image_url = product
        .image_for(color)
        .map(|img| img.image.clone())
        .unwrap_or_default();

    Ok(NewCartItem {
        product_id: product.id,
        name: product.name.clone(),
        price: product.price,
        quantity,
        color: color.to_string(),
        image_url,
        in_stock: product.in_stock,
    })
}

/// Bring every line in line with the catalog: current price, stock clamped,
/// empty lines dropped.
///
/// Products no longer in `catalog` count as out of stock. Returns the number
/// of lines removed.
///
/// # Errors
///
/// Returns `CartError::Storage` if the storage adapter fails.
pub fn sync_with_catalog<S: CartStorage>(
    cart: &mut CartStore<S>,
    catalog: &[Product],
) -> Result<usize, CartError> {
    let current: HashMap<ProductId, &Product> = catalog.iter().map(|p| (p.id, p)).collect();

    for product_id in product_ids(cart.items()) {
        match current.get(&product_id) {
            Some(product) => {
                cart.apply_price(product_id, product.price)?;
                cart.apply_stock(product_id, product.in_stock)?;
            }
            None => {
                cart.apply_stock(product_id, 0)?;
            }
        }
    }

    cart.reconcile()
}

/// Product ids referenced by the cart, without duplicates.
#[must_use]
pub fn product_ids(items: &[CartItem]) -> Vec<ProductId> {
    let mut ids: Vec<ProductId> = items.iter().map(|i| i.product_id).collect();
    ids.sort_by_key(ProductId::as_i32);
    ids.dedup();
    ids
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use vitrine_core::MemoryCartStorage;

    use super::*;
    use crate::models::product::ProductImage;
    use crate::services::checkout::cart_amount;

    fn product(id: i32, in_stock: i32) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Camiseta {id}"),
            description: String::new(),
            price: Decimal::new(4990, 2),
            brand: "Vitrine".to_string(),
            category: "camisetas".to_string(),
            in_stock,
            images: vec![
                ProductImage {
                    color: "Preto".to_string(),
                    color_code: "#000000".to_string(),
                    image: "https://img.example/preto.png".to_string(),
                },
                ProductImage {
                    color: "Branco".to_string(),
                    color_code: "#ffffff".to_string(),
                    image: "https://img.example/branco.png".to_string(),
                },
            ],
            review_count: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_line_for_uses_colour_image() {
        let line = line_for(&product(1, 5), "Branco", 2).unwrap();
        assert_eq!(line.image_url, "https://img.example/branco.png");
        assert_eq!(line.price, Decimal::new(4990, 2));
        assert_eq!(line.in_stock, 5);
    }

    #[test]
    fn test_line_for_rejects_unknown_colour() {
        assert_eq!(
            line_for(&product(1, 5), "Verde", 1),
            Err(CartLineError::UnknownColor("Verde".to_string()))
        );
    }

    #[test]
    fn test_line_for_rejects_sold_out_and_bad_quantity() {
        assert_eq!(
            line_for(&product(1, 0), "Preto", 1),
            Err(CartLineError::OutOfStock)
        );
        assert_eq!(
            line_for(&product(1, 3), "Preto", 0),
            Err(CartLineError::InvalidQuantity)
        );
    }

    #[test]
    fn test_sync_with_catalog_clamps_and_drops() {
        let mut cart = CartStore::open(MemoryCartStorage::default()).unwrap();
        cart.add(line_for(&product(1, 10), "Preto", 4).unwrap())
            .unwrap();
        cart.add(line_for(&product(2, 10), "Preto", 2).unwrap())
            .unwrap();
        cart.add(line_for(&product(3, 10), "Preto", 1).unwrap())
            .unwrap();

        // Product 1 now has 3 left, product 2 sold out, product 3 deleted.
        let removed = sync_with_catalog(&mut cart, &[product(1, 3), product(2, 0)]).unwrap();

        assert_eq!(removed, 2);
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].quantity, 3);
        assert_eq!(cart.items()[0].total, Decimal::new(14970, 2));
    }

    #[test]
    fn test_checkout_amount_follows_catalog() {
        let mut cart = CartStore::open(MemoryCartStorage::default()).unwrap();
        cart.add(line_for(&product(1, 5), "Preto", 5).unwrap())
            .unwrap();
        cart.add(line_for(&product(2, 5), "Preto", 1).unwrap())
            .unwrap();

        // Product 1 sold down to 2 and got cheaper, product 2 sold out.
        let mut cheaper = product(1, 2);
        cheaper.price = Decimal::new(3990, 2);
        sync_with_catalog(&mut cart, &[cheaper, product(2, 0)]).unwrap();

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].quantity, 2);
        assert_eq!(cart_amount(cart.items()), Ok(7980));
    }

    #[test]
    fn test_session_storage_tracks_writes() {
        let mut storage = SessionCartStorage::default();
        assert!(!storage.dirty);
        storage.save(&[]).unwrap();
        assert!(storage.dirty);
    }

    #[test]
    fn test_product_ids_dedup() {
        let mut cart = CartStore::open(MemoryCartStorage::default()).unwrap();
        cart.add(line_for(&product(2, 10), "Preto", 1).unwrap())
            .unwrap();
        cart.add(line_for(&product(1, 10), "Preto", 1).unwrap())
            .unwrap();
        cart.add(line_for(&product(2, 10), "Branco", 1).unwrap())
            .unwrap();

        assert_eq!(
            product_ids(cart.items()),
            vec![ProductId::new(1), ProductId::new(2)]
        );
    }
}
