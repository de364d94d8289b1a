//! Field rules guarding the checkout stage transitions.
//!
//! Each validator reports only the first failing rule, in a fixed order, so
//! the buyer sees one message at a time.

use chrono::Datelike;

use super::details::{PaymentDetails, ShippingDetails};
use super::input::{CARD_DIGITS, digits};

const MIN_PHONE_DIGITS: usize = 8;
const MIN_POSTAL_CODE_LEN: usize = 4;
const MIN_CVV_LEN: usize = 3;

/// Why shipping details were refused.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShippingError {
    /// Full name, address, city or phone is blank.
    #[error("Please fill in all required fields")]
    MissingRequiredFields,
    #[error("Phone number must have at least 8 digits")]
    PhoneTooShort,
    #[error("Postal code must have at least 4 digits")]
    PostalCodeTooShort,
    #[error("Please enter your full name (first and last name)")]
    IncompleteFullName,
}

/// Why payment details were refused.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentError {
    #[error("Please fill in all payment fields")]
    MissingFields,
    #[error("Card number must have exactly 16 digits")]
    CardNumberLength,
    #[error("CVV must have at least 3 digits")]
    CvvTooShort,
    #[error("Please enter the full name as it appears on the card")]
    IncompleteCardholderName,
    /// Month or year is not a number, or the month is outside 1-12.
    #[error("Expiry date is not valid")]
    InvalidExpiry,
    #[error("Expiry date cannot be in the past")]
    Expired,
}

/// A calendar month, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    #[must_use]
    pub const fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    /// The month containing `date`.
    #[must_use]
    pub fn of(date: &impl Datelike) -> Self {
        Self::new(date.year(), date.month())
    }

    /// The current month in local time.
    #[must_use]
    pub fn current() -> Self {
        Self::of(&chrono::Local::now().date_naive())
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn has_first_and_last_name(name: &str) -> bool {
    name.split_whitespace().nth(1).is_some()
}

/// Check shipping details before moving on to payment.
///
/// # Errors
///
/// Returns the first failing rule, in declaration order of [`ShippingError`].
pub fn validate_shipping(details: &ShippingDetails) -> Result<(), ShippingError> {
    if [
        &details.full_name,
        &details.address,
        &details.city,
        &details.phone,
    ]
    .into_iter()
    .any(|field| is_blank(field))
    {
        return Err(ShippingError::MissingRequiredFields);
    }

    if digits(&details.phone).len() < MIN_PHONE_DIGITS {
        return Err(ShippingError::PhoneTooShort);
    }

    let postal_code = details.postal_code.trim();
    if !postal_code.is_empty() && postal_code.chars().count() < MIN_POSTAL_CODE_LEN {
        return Err(ShippingError::PostalCodeTooShort);
    }

    if !has_first_and_last_name(&details.full_name) {
        return Err(ShippingError::IncompleteFullName);
    }

    Ok(())
}

/// Check payment details before moving on to review.
///
/// A card expiring in the current month is still accepted.
///
/// # Errors
///
/// Returns the first failing rule, in declaration order of [`PaymentError`].
pub fn validate_payment(details: &PaymentDetails, today: YearMonth) -> Result<(), PaymentError> {
    if [
        &details.card_number,
        &details.cardholder_name,
        &details.cvv,
        &details.expiry_month,
        &details.expiry_year,
    ]
    .into_iter()
    .any(|field| is_blank(field))
    {
        return Err(PaymentError::MissingFields);
    }

    let card: String = details
        .card_number
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if card.len() != CARD_DIGITS || !card.chars().all(|c| c.is_ascii_digit()) {
        return Err(PaymentError::CardNumberLength);
    }

    if details.cvv.trim().chars().count() < MIN_CVV_LEN {
        return Err(PaymentError::CvvTooShort);
    }

    if !has_first_and_last_name(&details.cardholder_name) {
        return Err(PaymentError::IncompleteCardholderName);
    }

    let expiry = parse_expiry(&details.expiry_month, &details.expiry_year)
        .ok_or(PaymentError::InvalidExpiry)?;
    if expiry < today {
        return Err(PaymentError::Expired);
    }

    Ok(())
}

fn parse_expiry(month: &str, year: &str) -> Option<YearMonth> {
    let month = month.trim().parse::<u32>().ok().filter(|m| (1..=12).contains(m))?;
    let year = year.trim().parse::<i32>().ok()?;
    Some(YearMonth::new(year, month))
}
