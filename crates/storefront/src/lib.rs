//! Cartflow Storefront library.
//!
//! Stateful side of Cartflow: the shared cart store and its persistence,
//! the checkout flow, the REST API client and configuration.
//!
//! # Modules
//!
//! - [`cart`] - Process-wide cart store with change notifications
//! - [`storage`] - Key-value backends the cart is mirrored into
//! - [`checkout`] - Shipping, payment and review stages and order submission
//! - [`api`] - REST client for products, profiles and orders
//! - [`config`] - Environment configuration
//! - [`state`] - Shared application state

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod state;
pub mod storage;

pub use cart::CartStore;
pub use checkout::{CheckoutError, CheckoutFlow, CheckoutSettings, OrderConfirmation, OrderGateway};
pub use config::CartflowConfig;
pub use error::{AppError, Result};
pub use state::AppState;
