//! Application state shared across commands.

use std::sync::Arc;

use cartflow_core::UserProfile;

use crate::api::{ApiClient, ApiError};
use crate::cart::CartStore;
use crate::checkout::{CheckoutError, CheckoutFlow};
use crate::config::CartflowConfig;
use crate::error::Result;
use crate::storage::{CartStorage, FileStorage};

/// Application state shared across the shell.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// cart store, the API client and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: CartflowConfig,
    cart: Arc<CartStore>,
    api: ApiClient,
}

impl AppState {
    /// Create application state with the cart persisted under
    /// `config.storage_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: CartflowConfig) -> Result<Self> {
        let storage = FileStorage::new(config.storage_dir.clone());
        Self::with_storage(config, Arc::new(storage))
    }

    /// Create application state over an explicit storage backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_storage(config: CartflowConfig, storage: Arc<dyn CartStorage>) -> Result<Self> {
        let api = ApiClient::new(&config.api)?;
        let cart = Arc::new(CartStore::load(storage));

        Ok(Self {
            inner: Arc::new(AppStateInner { config, cart, api }),
        })
    }

    /// Get a reference to the configuration.
    #[must_use]
    pub fn config(&self) -> &CartflowConfig {
        &self.inner.config
    }

    /// Get a reference to the shared cart store.
    #[must_use]
    pub fn cart(&self) -> &Arc<CartStore> {
        &self.inner.cart
    }

    /// Get a reference to the REST API client.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    /// Fetch the buyer's profile if credentials are configured.
    ///
    /// A missing or rejected profile is not an error for checkout: shipping
    /// details then start blank.
    pub async fn profile(&self) -> Option<UserProfile> {
        self.inner.config.api.token.as_ref()?;
        match self.inner.api.current_profile().await {
            Ok(profile) => Some(profile),
            Err(e @ (ApiError::Unauthorized(_) | ApiError::NotFound(_))) => {
                tracing::info!(error = %e, "no profile available, shipping details start blank");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to load profile");
                None
            }
        }
    }

    /// Begin a checkout over the shared cart.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` if the cart is empty.
    pub fn begin_checkout(
        &self,
        profile: Option<&UserProfile>,
    ) -> std::result::Result<CheckoutFlow, CheckoutError> {
        CheckoutFlow::start(
            Arc::clone(&self.inner.cart),
            profile,
            self.inner.config.checkout_settings(),
        )
    }
}
