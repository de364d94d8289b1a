//! Checkout rules: form data, input filters, stage validation and pricing.
//!
//! Everything here is pure. The stateful flow that submits orders lives in
//! the storefront crate.

mod details;
mod input;
mod pricing;
mod validation;

pub use details::{PaymentDetails, ShippingDetails, UserProfile};
pub use input::{
    CARD_DIGITS, digits, filter_cvv, filter_postal_code, format_card_number, format_phone, mask_card_number,
};
pub use pricing::{Quote, ShippingPolicy};
pub use validation::{PaymentError, ShippingError, YearMonth, validate_payment, validate_shipping};

use core::fmt;

/// A stage transition was refused.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error(transparent)]
    Shipping(#[from] ShippingError),
    #[error(transparent)]
    Payment(#[from] PaymentError),
}

/// The three sequential checkout stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CheckoutStage {
    #[default]
    Shipping,
    Payment,
    Review,
}

impl CheckoutStage {
    /// Move forward one stage if the data for the current stage is valid.
    ///
    /// `Review` has no validated successor (submission is handled by the
    /// flow) and is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns the first failing rule of the current stage.
    pub fn advance(
        self,
        shipping: &ShippingDetails,
        payment: &PaymentDetails,
        today: YearMonth,
    ) -> Result<Self, ValidationError> {
        match self {
            Self::Shipping => {
                validate_shipping(shipping)?;
                Ok(Self::Payment)
            }
            Self::Payment => {
                validate_payment(payment, today)?;
                Ok(Self::Review)
            }
            Self::Review => Ok(Self::Review),
        }
    }

    /// Move back one stage. Always allowed; `Shipping` stays put.
    #[must_use]
    pub const fn back(self) -> Self {
        match self {
            Self::Shipping | Self::Payment => Self::Shipping,
            Self::Review => Self::Payment,
        }
    }

    /// 1-based position, for step indicators.
    #[must_use]
    pub const fn step(self) -> u8 {
        match self {
            Self::Shipping => 1,
            Self::Payment => 2,
            Self::Review => 3,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Shipping => "Shipping",
            Self::Payment => "Payment",
            Self::Review => "Review",
        }
    }
}

impl fmt::Display for CheckoutStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
