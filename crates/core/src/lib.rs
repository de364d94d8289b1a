//! Cartflow Core - Cart and checkout domain library.
//!
//! This crate provides the types and rules shared by every Cartflow component:
//! - `storefront` - Cart store, persistence, checkout flow and REST client
//! - `cli` - Command-line shell driving the cart and checkout
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no storage,
//! no HTTP clients. This keeps it lightweight and easy to test.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs and prices
//! - [`cart`] - Line items and cart mutation rules
//! - [`checkout`] - Checkout form data, validation and pricing

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod checkout;
pub mod types;

pub use cart::{Cart, CartError, LineItem, Product};
pub use checkout::{
    CheckoutStage, PaymentDetails, PaymentError, Quote, ShippingDetails, ShippingError,
    ShippingPolicy, UserProfile, ValidationError, YearMonth,
};
pub use types::*;
