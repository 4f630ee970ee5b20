//! Shopping cart store.
//!
//! [`CartStore`] owns the line items of one shopper's cart and mirrors every
//! mutation into a [`CartStorage`] adapter. The store itself never touches
//! I/O; the server wires it to the session, tests use [`MemoryCartStorage`].
//!
//! Quantities are clamped to `[0, in_stock]` on every mutation path. A line
//! whose quantity reaches zero stays in the list until [`CartStore::reconcile`]
//! runs, so a UI can show "0" before the line disappears.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::id::ProductId;
use super::money::{MoneyError, to_minor_units};

/// Errors raised by cart operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    /// No line with the given id.
    #[error("cart item not found: {0}")]
    ItemNotFound(Uuid),
    /// The storage adapter failed to load or save.
    #[error("cart storage error: {0}")]
    Storage(String),
    /// The cart total cannot be expressed in minor units.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// One line of the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Line id, stable across mutations.
    pub id: Uuid,
    pub product_id: ProductId,
    pub name: String,
    /// Unit price in major units.
    pub price: Decimal,
    pub quantity: i32,
    /// `price * quantity`, recomputed on every mutation.
    pub total: Decimal,
    pub color: String,
    pub image_url: String,
    /// Stock level last seen for the product.
    pub in_stock: i32,
}

impl CartItem {
    fn clamp_quantity(&mut self, quantity: i32) {
        self.quantity = quantity.clamp(0, self.in_stock.max(0));
        self.total = self.price * Decimal::from(self.quantity);
    }
}

/// A line to add, as resolved from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCartItem {
    pub product_id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
    pub color: String,
    pub image_url: String,
    pub in_stock: i32,
}

/// Persistence adapter for a cart.
pub trait CartStorage {
    /// Load the persisted lines, empty when nothing was stored.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Storage`] if the stored cart cannot be read.
    fn load(&self) -> Result<Vec<CartItem>, CartError>;

    /// Replace the persisted lines with `items`.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Storage`] if the cart cannot be written.
    fn save(&mut self, items: &[CartItem]) -> Result<(), CartError>;
}

/// In-memory [`CartStorage`].
#[derive(Debug, Clone, Default)]
pub struct MemoryCartStorage {
    items: Vec<CartItem>,
    saves: usize,
}

impl MemoryCartStorage {
    /// Create storage pre-filled with `items`.
    #[must_use]
    pub const fn with_items(items: Vec<CartItem>) -> Self {
        Self { items, saves: 0 }
    }

    /// The lines as last saved.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Number of times `save` was called.
    #[must_use]
    pub const fn saves(&self) -> usize {
        self.saves
    }
}

impl CartStorage for MemoryCartStorage {
    fn load(&self) -> Result<Vec<CartItem>, CartError> {
        Ok(self.items.clone())
    }

    fn save(&mut self, items: &[CartItem]) -> Result<(), CartError> {
        self.items = items.to_vec();
        self.saves += 1;
        Ok(())
    }
}

/// A cart bound to a storage adapter.
#[derive(Debug)]
pub struct CartStore<S> {
    items: Vec<CartItem>,
    storage: S,
}

impl<S: CartStorage> CartStore<S> {
    /// Open the cart persisted in `storage`.
    ///
    /// Loaded lines are re-clamped and their totals recomputed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be read.
    pub fn open(storage: S) -> Result<Self, CartError> {
        let mut items = storage.load()?;
        for item in &mut items {
            let quantity = item.quantity;
            item.clamp_quantity(quantity);
        }
        Ok(Self { items, storage })
    }

    /// Current lines, in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Add `item`, merging with an existing line of the same product and colour.
    ///
    /// The merged quantity is `existing + requested`, clamped to the incoming
    /// stock level. Price, name, image and stock are refreshed from `item`.
    /// Returns the id of the affected line.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage adapter fails.
    pub fn add(&mut self, item: NewCartItem) -> Result<Uuid, CartError> {
        let requested = item.quantity.max(0);

        let id = if let Some(line) = self
            .items
            .iter_mut()
            .find(|line| line.product_id == item.product_id && line.color == item.color)
        {
            let quantity = line.quantity.saturating_add(requested);
            line.name = item.name;
            line.price = item.price;
            line.image_url = item.image_url;
            line.in_stock = item.in_stock;
            line.clamp_quantity(quantity);
            line.id
        } else {
            let mut line = CartItem {
                id: Uuid::new_v4(),
                product_id: item.product_id,
                name: item.name,
                price: item.price,
                quantity: 0,
                total: Decimal::ZERO,
                color: item.color,
                image_url: item.image_url,
                in_stock: item.in_stock,
            };
            line.clamp_quantity(requested);
            let id = line.id;
            self.items.push(line);
            id
        };

        self.persist()?;
        Ok(id)
    }

    /// Remove the line with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::ItemNotFound`] if no such line exists.
    pub fn remove(&mut self, id: Uuid) -> Result<CartItem, CartError> {
        let index = self
            .items
            .iter()
            .position(|line| line.id == id)
            .ok_or(CartError::ItemNotFound(id))?;
        let removed = self.items.remove(index);
        self.persist()?;
        Ok(removed)
    }

    /// Set the quantity of a line, clamped to `[0, in_stock]`.
    ///
    /// A resulting zero is kept until the next [`reconcile`](Self::reconcile).
    ///
    /// # Errors
    ///
    /// Returns [`CartError::ItemNotFound`] if no such line exists.
    pub fn set_quantity(&mut self, id: Uuid, quantity: i32) -> Result<(), CartError> {
        self.line_mut(id)?.clamp_quantity(quantity);
        self.persist()
    }

    /// Increase a line by one, up to its stock level.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::ItemNotFound`] if no such line exists.
    pub fn increment(&mut self, id: Uuid) -> Result<(), CartError> {
        let line = self.line_mut(id)?;
        let quantity = line.quantity.saturating_add(1);
        line.clamp_quantity(quantity);
        self.persist()
    }

    /// Decrease a line by one, down to zero.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::ItemNotFound`] if no such line exists.
    pub fn decrement(&mut self, id: Uuid) -> Result<(), CartError> {
        let line = self.line_mut(id)?;
        let quantity = line.quantity.saturating_sub(1);
        line.clamp_quantity(quantity);
        self.persist()
    }

    /// Record a new stock level for every line of `product_id`.
    ///
    /// Lines above the new level are clamped down. Returns the number of lines
    /// whose quantity changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage adapter fails.
    pub fn apply_stock(&mut self, product_id: ProductId, in_stock: i32) -> Result<usize, CartError> {
        let mut changed = 0;
        let mut touched = false;
        for line in self.items.iter_mut().filter(|l| l.product_id == product_id) {
            let before = line.quantity;
            line.in_stock = in_stock;
            line.clamp_quantity(before);
            touched = true;
            if line.quantity != before {
                changed += 1;
            }
        }
        if touched {
            self.persist()?;
        }
        Ok(changed)
    }

    /// Record the current catalog price for every line of `product_id`.
    ///
    /// Returns the number of lines whose price changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage adapter fails.
    pub fn apply_price(&mut self, product_id: ProductId, price: Decimal) -> Result<usize, CartError> {
        let mut changed = 0;
        for line in self
            .items
            .iter_mut()
            .filter(|l| l.product_id == product_id && l.price != price)
        {
            line.price = price;
            line.clamp_quantity(line.quantity);
            changed += 1;
        }
        if changed > 0 {
            self.persist()?;
        }
        Ok(changed)
    }

    /// Drop every line whose quantity is zero. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage adapter fails.
    pub fn reconcile(&mut self) -> Result<usize, CartError> {
        let before = self.items.len();
        self.items.retain(|line| line.quantity > 0);
        let removed = before - self.items.len();
        if removed > 0 {
            self.persist()?;
        }
        Ok(removed)
    }

    /// Remove every line.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage adapter fails.
    pub fn clear(&mut self) -> Result<(), CartError> {
        self.items.clear();
        self.persist()
    }

    /// Sum of line totals in major units.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.items.iter().map(|line| line.total).sum()
    }

    /// Sum of line totals in minor units, `round(subtotal * 100)`.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Money`] if the total cannot be converted.
    pub fn amount_minor(&self) -> Result<i64, CartError> {
        Ok(to_minor_units(self.subtotal())?)
    }

    /// Borrow the storage adapter.
    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// Release the storage adapter, e.g. to flush it.
    #[must_use]
    pub fn into_storage(self) -> S {
        self.storage
    }

    fn line_mut(&mut self, id: Uuid) -> Result<&mut CartItem, CartError> {
        self.items
            .iter_mut()
            .find(|line| line.id == id)
            .ok_or(CartError::ItemNotFound(id))
    }

    fn persist(&mut self) -> Result<(), CartError> {
        self.storage.save(&self.items)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn shirt(color: &str, quantity: i32, in_stock: i32) -> NewCartItem {
        NewCartItem {
            product_id: ProductId::new(1),
            name: "Camiseta".to_string(),
            price: Decimal::new(1000, 2),
            quantity,
            color: color.to_string(),
            image_url: format!("https://img.example.com/{color}.png"),
            in_stock,
        }
    }

    fn empty_cart() -> CartStore<MemoryCartStorage> {
        CartStore::open(MemoryCartStorage::default()).unwrap()
    }

    #[test]
    fn test_add_appends_new_line() {
        let mut cart = empty_cart();
        let id = cart.add(shirt("azul", 2, 10)).unwrap();

        assert_eq!(cart.items().len(), 1);
        let line = &cart.items()[0];
        assert_eq!(line.id, id);
        assert_eq!(line.quantity, 2);
        assert_eq!(line.total, Decimal::new(2000, 2));
    }

    #[test]
    fn test_add_merges_same_product_and_color() {
        let mut cart = empty_cart();
        let first = cart.add(shirt("azul", 2, 10)).unwrap();
        let second = cart.add(shirt("azul", 3, 10)).unwrap();

        assert_eq!(first, second);
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].quantity, 5);
    }

    #[test]
    fn test_add_different_color_is_new_line() {
        let mut cart = empty_cart();
        cart.add(shirt("azul", 1, 10)).unwrap();
        cart.add(shirt("verde", 1, 10)).unwrap();
        assert_eq!(cart.items().len(), 2);
    }

    #[test]
    fn test_add_clamps_to_stock() {
        let mut cart = empty_cart();
        cart.add(shirt("azul", 4, 5)).unwrap();
        cart.add(shirt("azul", 4, 5)).unwrap();
        assert_eq!(cart.items()[0].quantity, 5);

        let mut cart = empty_cart();
        cart.add(shirt("azul", 9, 3)).unwrap();
        assert_eq!(cart.items()[0].quantity, 3);
        assert_eq!(cart.items()[0].total, Decimal::new(3000, 2));
    }

    #[test]
    fn test_set_quantity_clamps_and_zero_waits_for_reconcile() {
        let mut cart = empty_cart();
        let id = cart.add(shirt("azul", 2, 4)).unwrap();

        cart.set_quantity(id, 99).unwrap();
        assert_eq!(cart.items()[0].quantity, 4);

        cart.set_quantity(id, -3).unwrap();
        assert_eq!(cart.items()[0].quantity, 0);
        assert_eq!(cart.items().len(), 1);

        assert_eq!(cart.reconcile().unwrap(), 1);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_increment_and_decrement_stay_in_bounds() {
        let mut cart = empty_cart();
        let id = cart.add(shirt("azul", 1, 2)).unwrap();

        cart.increment(id).unwrap();
        cart.increment(id).unwrap();
        assert_eq!(cart.items()[0].quantity, 2);

        cart.decrement(id).unwrap();
        cart.decrement(id).unwrap();
        cart.decrement(id).unwrap();
        assert_eq!(cart.items()[0].quantity, 0);
    }

    #[test]
    fn test_unknown_line_errors() {
        let mut cart = empty_cart();
        let missing = Uuid::new_v4();
        assert_eq!(
            cart.set_quantity(missing, 1),
            Err(CartError::ItemNotFound(missing))
        );
        assert!(cart.remove(missing).is_err());
    }

    #[test]
    fn test_apply_stock_clamps_every_line_of_product() {
        let mut cart = empty_cart();
        cart.add(shirt("azul", 5, 10)).unwrap();
        cart.add(shirt("verde", 1, 10)).unwrap();

        let changed = cart.apply_stock(ProductId::new(1), 2).unwrap();
        assert_eq!(changed, 1);
        assert_eq!(cart.items()[0].quantity, 2);
        assert_eq!(cart.items()[1].quantity, 1);

        cart.apply_stock(ProductId::new(1), 0).unwrap();
        assert_eq!(cart.reconcile().unwrap(), 2);
    }

    #[test]
    fn test_apply_price_recomputes_totals() {
        let mut cart = empty_cart();
        cart.add(shirt("azul", 2, 10)).unwrap();
        let before = cart.items()[0].price;

        assert_eq!(cart.apply_price(ProductId::new(1), before).unwrap(), 0);

        let changed = cart
            .apply_price(ProductId::new(1), Decimal::new(1500, 2))
            .unwrap();
        assert_eq!(changed, 1);
        assert_eq!(cart.items()[0].price, Decimal::new(1500, 2));
        assert_eq!(cart.items()[0].total, Decimal::new(3000, 2));
        assert_eq!(cart.storage().items()[0].total, Decimal::new(3000, 2));
    }

    #[test]
    fn test_every_mutation_is_mirrored() {
        let mut cart = empty_cart();
        let id = cart.add(shirt("azul", 1, 5)).unwrap();
        cart.increment(id).unwrap();
        cart.set_quantity(id, 3).unwrap();

        let storage = cart.into_storage();
        assert_eq!(storage.saves(), 3);
        assert_eq!(storage.items()[0].quantity, 3);
    }

    #[test]
    fn test_open_restores_persisted_lines() {
        let mut cart = empty_cart();
        cart.add(shirt("azul", 2, 5)).unwrap();
        let storage = cart.into_storage();

        let reopened = CartStore::open(storage).unwrap();
        assert_eq!(reopened.items().len(), 1);
        assert_eq!(reopened.items()[0].quantity, 2);
    }

    #[test]
    fn test_amount_minor() {
        let mut cart = empty_cart();
        cart.add(shirt("azul", 2, 5)).unwrap();
        assert_eq!(cart.subtotal(), Decimal::new(2000, 2));
        assert_eq!(cart.amount_minor().unwrap(), 2000);

        cart.clear().unwrap();
        assert_eq!(cart.amount_minor().unwrap(), 0);
    }
}
