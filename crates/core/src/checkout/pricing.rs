//! Shipping cost and order totals.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::cart::Cart;

/// Flat-rate shipping with a free-shipping threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShippingPolicy {
    /// Subtotals strictly above this ship for free.
    pub free_shipping_threshold: Decimal,
    pub flat_fee: Decimal,
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        Self {
            free_shipping_threshold: Decimal::new(50_000, 0),
            flat_fee: Decimal::new(5_000, 0),
        }
    }
}

impl ShippingPolicy {
    /// Shipping cost for a cart subtotal.
    #[must_use]
    pub fn shipping_cost(&self, subtotal: Decimal) -> Decimal {
        if subtotal > self.free_shipping_threshold {
            Decimal::ZERO
        } else {
            self.flat_fee
        }
    }

    /// Totals for the review stage. Computed fresh on every call.
    #[must_use]
    pub fn quote(&self, cart: &Cart) -> Quote {
        let subtotal = cart.total_price();
        let shipping = self.shipping_cost(subtotal);
        Quote {
            total_items: cart.total_items(),
            subtotal,
            shipping,
            total: subtotal.saturating_add(shipping),
        }
    }
}

/// Order totals shown before submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub total_items: u64,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

impl Quote {
    #[must_use]
    pub fn has_free_shipping(&self) -> bool {
        self.shipping.is_zero()
    }
}
