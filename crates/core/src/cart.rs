//! Cart line items and the pure cart rules.
//!
//! [`Cart`] holds no I/O: persistence and change notification live in the
//! storefront crate's `CartStore`, which wraps this type.

use std::collections::HashSet;
use std::num::NonZeroU32;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::{Price, ProductId, SellerId};

/// A product as offered by the catalog, snapshotted when added to the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    /// Units available, if the catalog tracks stock for this product.
    #[serde(default)]
    pub stock: Option<u32>,
    pub seller_id: SellerId,
}

/// One product entry in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product_id: ProductId,
    /// Display name at add time. Not re-fetched.
    pub name: String,
    /// Unit price at add time.
    pub unit_price: Price,
    pub quantity: NonZeroU32,
    /// Maximum quantity suggested by the catalog at add time. Advisory only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock_cap: Option<u32>,
    pub seller_id: SellerId,
}

impl LineItem {
    /// Create a line item holding a single unit of `product`.
    #[must_use]
    pub fn from_product(product: &Product) -> Self {
        Self {
            product_id: product.id,
            name: product.name.clone(),
            unit_price: product.price,
            quantity: NonZeroU32::MIN,
            stock_cap: product.stock,
            seller_id: product.seller_id,
        }
    }

    /// `unit_price * quantity`.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.unit_price.times(self.quantity.get())
    }

    /// `unit_price * quantity`, or `None` if it is not representable.
    #[must_use]
    pub fn checked_subtotal(&self) -> Option<Decimal> {
        self.unit_price.checked_times(self.quantity.get())
    }

    /// Whether the quantity has reached the stock cap.
    #[must_use]
    pub fn is_at_stock_cap(&self) -> bool {
        self.stock_cap.is_some_and(|cap| self.quantity.get() >= cap)
    }

    /// Whether the UI should offer another unit of this item.
    #[must_use]
    pub fn can_increment(&self) -> bool {
        !self.is_at_stock_cap()
    }

    /// Whether the quantity is above the stock cap.
    #[must_use]
    pub fn exceeds_stock_cap(&self) -> bool {
        self.stock_cap.is_some_and(|cap| self.quantity.get() > cap)
    }
}

/// Errors that can occur when rebuilding a cart from stored line items.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    /// The same product appears on more than one line.
    #[error("product {0} appears more than once")]
    DuplicateProduct(ProductId),
    /// The cart total does not fit in a [`Decimal`].
    #[error("cart total is out of range")]
    TotalOutOfRange,
}

/// The buyer's pending selections, in the order they were added.
///
/// Product ids are unique within a cart: adding a product that is already
/// present increments its quantity instead of adding a line. The total of
/// every line always fits in a [`Decimal`]; mutations that would break this
/// are refused.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<LineItem>", into = "Vec<LineItem>")]
pub struct Cart {
    items: Vec<LineItem>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Build a cart from line items.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::DuplicateProduct`] if two lines share a product id
    /// and [`CartError::TotalOutOfRange`] if the total cannot be computed.
    pub fn from_items(items: Vec<LineItem>) -> Result<Self, CartError> {
        let mut seen = HashSet::with_capacity(items.len());
        for item in &items {
            if !seen.insert(item.product_id) {
                return Err(CartError::DuplicateProduct(item.product_id));
            }
        }

        let cart = Self { items };
        if cart.checked_total_price().is_none() {
            return Err(CartError::TotalOutOfRange);
        }
        Ok(cart)
    }

    /// Line items in insertion order.
    #[must_use]
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Look up the line for a product.
    #[must_use]
    pub fn get(&self, product_id: ProductId) -> Option<&LineItem> {
        self.items.iter().find(|item| item.product_id == product_id)
    }

    /// Sum of all quantities.
    #[must_use]
    pub fn total_items(&self) -> u64 {
        self.items
            .iter()
            .map(|item| u64::from(item.quantity.get()))
            .sum()
    }

    /// Sum of `unit_price * quantity` over all lines.
    #[must_use]
    pub fn total_price(&self) -> Decimal {
        // Never saturates in practice: every constructor and mutation keeps
        // the checked total representable.
        self.items
            .iter()
            .fold(Decimal::ZERO, |total, item| total.saturating_add(item.subtotal()))
    }

    /// Sum of `unit_price * quantity`, or `None` if it is not representable.
    #[must_use]
    pub fn checked_total_price(&self) -> Option<Decimal> {
        self.checked_total_with(None)
    }

    /// Checked total with the quantity of one line replaced.
    fn checked_total_with(&self, replaced: Option<(ProductId, u32)>) -> Option<Decimal> {
        self.items.iter().try_fold(Decimal::ZERO, |total, item| {
            let subtotal = match replaced {
                Some((product_id, quantity)) if product_id == item.product_id => {
                    item.unit_price.checked_times(quantity)?
                }
                _ => item.checked_subtotal()?,
            };
            total.checked_add(subtotal)
        })
    }

    /// Add one unit of `product`.
    ///
    /// A product already in the cart gains exactly one unit, whatever
    /// `requested` says; a new product starts at one unit. Callers that want a
    /// specific quantity follow up with [`Cart::update_quantity`].
    ///
    /// Returns `false` if nothing changed, which happens when the quantity is
    /// already at `u32::MAX` or the cart total would go out of range.
    pub fn add(&mut self, product: &Product, requested: u32) -> bool {
        if requested != 1 {
            debug!(
                product_id = %product.id,
                requested,
                "requested quantity ignored, adding a single unit"
            );
        }

        let next_total = match self.get(product.id) {
            Some(item) => item
                .quantity
                .checked_add(1)
                .and_then(|quantity| self.checked_total_with(Some((product.id, quantity.get())))),
            None => self
                .checked_total_price()
                .and_then(|total| total.checked_add(product.price.amount())),
        };
        if next_total.is_none() {
            warn!(product_id = %product.id, "cart line or total out of range, unit not added");
            return false;
        }

        match self
            .items
            .iter_mut()
            .find(|item| item.product_id == product.id)
        {
            Some(item) => item.quantity = item.quantity.saturating_add(1),
            None => self.items.push(LineItem::from_product(product)),
        }
        true
    }

    /// Remove the line for a product. Returns `false` if it was not present.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.product_id != product_id);
        self.items.len() != before
    }

    /// Set the quantity of a line.
    ///
    /// Zero or negative quantities remove the line. Quantities above the
    /// stock cap are applied and logged; quantities that would take the cart
    /// total out of range are refused. Returns `false` if nothing changed.
    pub fn update_quantity(&mut self, product_id: ProductId, quantity: i64) -> bool {
        let Some(quantity) = u32::try_from(quantity.max(0))
            .ok()
            .or(Some(u32::MAX))
            .and_then(NonZeroU32::new)
        else {
            return self.remove(product_id);
        };

        match self.get(product_id) {
            Some(item) if item.quantity != quantity => {}
            _ => return false,
        }
        if self
            .checked_total_with(Some((product_id, quantity.get())))
            .is_none()
        {
            warn!(
                product_id = %product_id,
                quantity = quantity.get(),
                "cart total out of range, quantity unchanged"
            );
            return false;
        }

        let Some(item) = self
            .items
            .iter_mut()
            .find(|item| item.product_id == product_id)
        else {
            return false;
        };
        item.quantity = quantity;

        if item.exceeds_stock_cap() {
            warn!(
                product_id = %product_id,
                quantity = quantity.get(),
                stock_cap = ?item.stock_cap,
                "quantity exceeds stock cap"
            );
        }
        true
    }

    /// Remove every line. Returns `false` if the cart was already empty.
    pub fn clear(&mut self) -> bool {
        let had_items = !self.items.is_empty();
        self.items.clear();
        had_items
    }
}

impl TryFrom<Vec<LineItem>> for Cart {
    type Error = CartError;

    fn try_from(items: Vec<LineItem>) -> Result<Self, Self::Error> {
        Self::from_items(items)
    }
}

impl From<Cart> for Vec<LineItem> {
    fn from(cart: Cart) -> Self {
        cart.items
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(id: i64, price: i64, stock: Option<u32>) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            price: Price::new(Decimal::new(price, 0)).unwrap(),
            stock,
            seller_id: SellerId::new(9),
        }
    }

    #[test]
    fn test_add_distinct_products() {
        let mut cart = Cart::new();
        for id in 1..=5 {
            cart.add(&product(id, 100, None), 1);
        }

        assert_eq!(cart.total_items(), 5);
        assert!(cart.items().iter().all(|item| item.quantity.get() == 1));
        let ids: Vec<i64> = cart.items().iter().map(|i| i.product_id.as_i64()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_add_same_product_twice_increments() {
        let mut cart = Cart::new();
        let capped = product(1, 100, Some(1));
        cart.add(&capped, 1);
        cart.add(&capped, 1);

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.get(ProductId::new(1)).unwrap().quantity.get(), 2);
    }

    #[test]
    fn test_add_ignores_requested_quantity() {
        let mut cart = Cart::new();
        let p = product(1, 100, None);
        cart.add(&p, 5);
        assert_eq!(cart.total_items(), 1);
        cart.add(&p, 3);
        assert_eq!(cart.total_items(), 2);
    }

    #[test]
    fn test_update_quantity_zero_or_negative_removes() {
        let mut cart = Cart::new();
        cart.add(&product(1, 100, None), 1);
        cart.add(&product(2, 100, None), 1);

        assert!(cart.update_quantity(ProductId::new(1), 0));
        assert!(cart.update_quantity(ProductId::new(2), -5));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut cart = Cart::new();
        cart.add(&product(1, 100, None), 1);
        assert!(!cart.remove(ProductId::new(99)));
        assert_eq!(cart.len(), 1);
    }

    #[test]
    fn test_update_quantity_missing_product() {
        let mut cart = Cart::new();
        assert!(!cart.update_quantity(ProductId::new(3), 4));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_update_quantity_above_cap_is_applied() {
        let mut cart = Cart::new();
        cart.add(&product(1, 100, Some(2)), 1);
        assert!(cart.update_quantity(ProductId::new(1), 5));

        let item = cart.get(ProductId::new(1)).unwrap();
        assert_eq!(item.quantity.get(), 5);
        assert!(item.exceeds_stock_cap());
        assert!(!item.can_increment());
    }

    #[test]
    fn test_totals_follow_mutations() {
        let mut cart = Cart::new();
        cart.add(&product(1, 10_000, None), 1);
        cart.add(&product(2, 250, None), 1);
        cart.update_quantity(ProductId::new(1), 2);

        assert_eq!(cart.total_items(), 3);
        assert_eq!(cart.total_price(), Decimal::new(20_250, 0));
        // Reads are idempotent
        assert_eq!(cart.total_price(), Decimal::new(20_250, 0));

        cart.remove(ProductId::new(2));
        assert_eq!(cart.total_price(), Decimal::new(20_000, 0));
        assert!(cart.clear());
        assert_eq!(cart.total_price(), Decimal::ZERO);
        assert!(!cart.clear());
    }

    #[test]
    fn test_serialized_layout() {
        let mut cart = Cart::new();
        cart.add(&product(7, 1500, Some(3)), 1);

        let json: serde_json::Value = serde_json::to_value(&cart).unwrap();
        let line = &json.as_array().unwrap()[0];
        assert_eq!(line["productId"], 7);
        assert_eq!(line["quantity"], 1);
        assert_eq!(line["stockCap"], 3);
        assert_eq!(line["sellerId"], 9);
        assert_eq!(line["unitPrice"], "1500");
    }

    #[test]
    fn test_roundtrip_preserves_order() {
        let mut cart = Cart::new();
        cart.add(&product(3, 10, None), 1);
        cart.add(&product(1, 20, Some(4)), 1);
        cart.add(&product(1, 20, Some(4)), 1);

        let json = serde_json::to_string(&cart).unwrap();
        let restored: Cart = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, cart);
    }

    #[test]
    fn test_deserialize_rejects_duplicates_and_zero_quantity() {
        let duplicate = r#"[
            {"productId":1,"name":"a","unitPrice":1,"quantity":1,"sellerId":1},
            {"productId":1,"name":"a","unitPrice":1,"quantity":2,"sellerId":1}
        ]"#;
        assert!(serde_json::from_str::<Cart>(duplicate).is_err());

        let zero = r#"[{"productId":1,"name":"a","unitPrice":1,"quantity":0,"sellerId":1}]"#;
        assert!(serde_json::from_str::<Cart>(zero).is_err());
    }

    fn priced_at(id: i64, amount: Decimal) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            price: Price::new(amount).unwrap(),
            stock: None,
            seller_id: SellerId::new(9),
        }
    }

    #[test]
    fn test_from_items_reports_first_repeated_product() {
        let line = |id| LineItem::from_product(&product(id, 10, None));
        assert_eq!(
            Cart::from_items(vec![line(1), line(2), line(3), line(2), line(1)]),
            Err(CartError::DuplicateProduct(ProductId::new(2)))
        );
        assert_eq!(Cart::from_items(vec![line(4), line(5)]).unwrap().len(), 2);
    }

    #[test]
    fn test_from_items_rejects_total_out_of_range() {
        let huge = LineItem {
            quantity: NonZeroU32::new(2).unwrap(),
            ..LineItem::from_product(&priced_at(1, Decimal::MAX))
        };
        assert_eq!(
            Cart::from_items(vec![huge]),
            Err(CartError::TotalOutOfRange)
        );

        let single = LineItem::from_product(&priced_at(1, Decimal::MAX));
        let other = LineItem::from_product(&priced_at(2, Decimal::ONE));
        assert_eq!(
            Cart::from_items(vec![single, other]),
            Err(CartError::TotalOutOfRange)
        );
    }

    #[test]
    fn test_mutations_keep_total_in_range() {
        let mut cart = Cart::new();
        let expensive = priced_at(1, Decimal::MAX);
        assert!(cart.add(&expensive, 1));
        assert_eq!(cart.total_price(), Decimal::MAX);

        assert!(!cart.add(&expensive, 1));
        assert!(!cart.add(&priced_at(2, Decimal::ONE), 1));
        assert!(!cart.update_quantity(ProductId::new(1), 3));
        assert_eq!(cart.total_items(), 1);
        assert_eq!(cart.checked_total_price(), Some(Decimal::MAX));

        // A free product still fits
        assert!(cart.add(&priced_at(3, Decimal::ZERO), 1));
        assert_eq!(cart.len(), 2);
    }
}
