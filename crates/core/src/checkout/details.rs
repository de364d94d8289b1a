//! Form data collected during checkout.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::input::digits;

/// Profile of the signed-in buyer, as returned by the profile endpoint.
///
/// Every field is optional: profiles are often incomplete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Precomposed name, used when first or last name is missing.
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
}

impl UserProfile {
    /// "First Last" when both parts are present, else the precomposed name.
    #[must_use]
    pub fn display_name(&self) -> String {
        match (non_empty(self.first_name.as_ref()), non_empty(self.last_name.as_ref())) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            _ => self.full_name.clone().unwrap_or_default(),
        }
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// Where the order is delivered. Lives only as long as the checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShippingDetails {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    /// State or province.
    pub state: String,
    pub postal_code: String,
    pub country: String,
    /// Delivery notes.
    pub notes: Option<String>,
}

impl ShippingDetails {
    /// Blank details for `country`.
    #[must_use]
    pub fn with_country(country: impl Into<String>) -> Self {
        Self {
            country: country.into(),
            ..Self::default()
        }
    }

    /// Details prefilled from the buyer's profile.
    #[must_use]
    pub fn from_profile(profile: &UserProfile, country: impl Into<String>) -> Self {
        let field = |value: &Option<String>| value.clone().unwrap_or_default();
        Self {
            full_name: profile.display_name(),
            email: field(&profile.email),
            phone: field(&profile.phone),
            address: field(&profile.address),
            city: field(&profile.city),
            state: field(&profile.region),
            postal_code: field(&profile.postal_code),
            country: country.into(),
            notes: None,
        }
    }

    /// Single-line address sent with the order and shown in the confirmation.
    ///
    /// ```
    /// use cartflow_core::ShippingDetails;
    ///
    /// let details = ShippingDetails {
    ///     address: "Calle 1".into(),
    ///     city: "CABA".into(),
    ///     state: "Buenos Aires".into(),
    ///     postal_code: "1406".into(),
    ///     country: "Argentina".into(),
    ///     notes: Some("Ring twice".into()),
    ///     ..ShippingDetails::default()
    /// };
    /// assert_eq!(
    ///     details.compose_address(),
    ///     "Calle 1, CABA, Buenos Aires 1406, Argentina - Ring twice"
    /// );
    /// ```
    #[must_use]
    pub fn compose_address(&self) -> String {
        let mut address = format!(
            "{}, {}, {} {}, {}",
            self.address, self.city, self.state, self.postal_code, self.country
        );
        if let Some(notes) = self.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            address.push_str(" - ");
            address.push_str(notes);
        }
        address
    }
}

/// Simulated card data. Never leaves the process.
///
/// Implements `Debug` manually to redact the card number and CVV.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct PaymentDetails {
    /// Digits, optionally grouped with spaces.
    pub card_number: String,
    pub cardholder_name: String,
    pub expiry_month: String,
    pub expiry_year: String,
    pub cvv: String,
}

impl PaymentDetails {
    /// Card number with all but the last four digits hidden.
    #[must_use]
    pub fn masked_card_number(&self) -> String {
        super::input::mask_card_number(&self.card_number)
    }

    /// Card number digits without grouping.
    #[must_use]
    pub fn card_digits(&self) -> String {
        digits(&self.card_number)
    }
}

impl fmt::Debug for PaymentDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentDetails")
            .field("card_number", &self.masked_card_number())
            .field("cardholder_name", &self.cardholder_name)
            .field("expiry_month", &self.expiry_month)
            .field("expiry_year", &self.expiry_year)
            .field("cvv", &"[REDACTED]")
            .finish()
    }
}
