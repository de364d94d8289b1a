//! Unified error handling.
//!
//! Provides a unified `AppError` type for callers that drive the whole
//! storefront (the CLI). Library modules keep their own error enums.

use thiserror::Error;

use crate::api::ApiError;
use crate::checkout::CheckoutError;
use crate::config::ConfigError;

/// Application-level error type for Cartflow.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// REST API call failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Checkout step refused.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    /// Bad input from the user.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    /// Whether the error reflects a fault outside the user's control and
    /// should be reported to error tracking.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::Api(
                    ApiError::Http(_)
                        | ApiError::Parse(_)
                        | ApiError::Url(_)
                        | ApiError::Status { .. }
                )
        )
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::BadRequest("quantity must be a number".to_string());
        assert_eq!(err.to_string(), "Bad request: quantity must be a number");

        let err = AppError::from(CheckoutError::EmptyCart);
        assert_eq!(err.to_string(), "The cart is empty");
    }

    #[test]
    fn test_internal_classification() {
        assert!(
            AppError::from(ApiError::Status {
                status: 500,
                message: "boom".to_string()
            })
            .is_internal()
        );
        assert!(!AppError::from(ApiError::NotFound("product 9".to_string())).is_internal());
        assert!(!AppError::from(CheckoutError::Completed).is_internal());
        assert!(!AppError::BadRequest(String::new()).is_internal());
    }
}
