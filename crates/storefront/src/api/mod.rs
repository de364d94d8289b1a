//! Storefront REST API client.
//!
//! # Architecture
//!
//! - `reqwest` with a client-wide timeout (`CARTFLOW_REQUEST_TIMEOUT_SECS`)
//! - Optional bearer token attached to every request
//! - Error bodies are reduced to one readable message by
//!   [`describe_error_body`]
//!
//! # Endpoints
//!
//! - `GET  products/{id}` - catalog snapshot for adding to the cart
//! - `GET  users/me/profile` - buyer profile used to prefill shipping
//! - `POST orders/` - order creation (see [`crate::checkout::OrderGateway`])

mod types;

pub use types::{
    CreateOrderRequest, GENERIC_ERROR_MESSAGE, OrderCreated, OrderItem, describe_error_body,
};

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;
use uuid::Uuid;

use cartflow_core::{Product, ProductId, UserProfile};

use crate::checkout::{OrderGateway, SubmitError};
use crate::config::ApiConfig;

/// Errors that can occur when calling the storefront API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (connection, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Endpoint URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or expired credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Any other non-success status.
    #[error("API returned {status}: {message}")]
    Status { status: u16, message: String },
}

impl ApiError {
    /// Whether the request timed out.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Http(e) if e.is_timeout())
    }
}

impl From<ApiError> for SubmitError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Http(e) if e.is_timeout() => Self::Timeout,
            ApiError::Http(e) if e.is_decode() => Self::InvalidResponse(e.to_string()),
            ApiError::Http(e) => Self::Network(e.to_string()),
            ApiError::Url(e) => Self::Network(e.to_string()),
            ApiError::Parse(e) => Self::InvalidResponse(e.to_string()),
            ApiError::NotFound(message) => Self::Rejected {
                status: StatusCode::NOT_FOUND.as_u16(),
                message,
            },
            ApiError::Unauthorized(message) => Self::Rejected {
                status: StatusCode::UNAUTHORIZED.as_u16(),
                message,
            },
            ApiError::Status { status, message } => Self::Rejected { status, message },
        }
    }
}

/// Client for the storefront REST API.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    token: Option<SecretString>,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Http` if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.base_url.clone(),
                token: config.token.clone(),
            }),
        })
    }

    /// Base URL all endpoints are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let url = self.inner.base_url.join(path)?;
        let mut builder = self.inner.client.request(method, url);
        if let Some(token) = &self.inner.token {
            builder = builder.bearer_auth(token.expose_secret());
        }
        Ok(builder)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.request(Method::GET, path)?.send().await?;
        read_json(response).await
    }

    /// Fetch a product from the catalog.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the product does not exist, or another
    /// `ApiError` if the request fails.
    #[instrument(skip(self))]
    pub async fn get_product(&self, id: ProductId) -> Result<Product, ApiError> {
        self.get_json(&format!("products/{id}")).await
    }

    /// Fetch the signed-in buyer's profile.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` without a valid token, or another
    /// `ApiError` if the request fails.
    #[instrument(skip(self))]
    pub async fn current_profile(&self) -> Result<UserProfile, ApiError> {
        self.get_json("users/me/profile").await
    }

    /// Create an order.
    ///
    /// The idempotency key is sent as `Idempotency-Key` so a retried
    /// submission cannot create a second order.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or the API rejects the order.
    #[instrument(skip(self, request), fields(items = request.items.len()))]
    pub async fn create_order(
        &self,
        request: &CreateOrderRequest,
        idempotency_key: Uuid,
    ) -> Result<OrderCreated, ApiError> {
        let response = self
            .request(Method::POST, "orders/")?
            .header("Idempotency-Key", idempotency_key.to_string())
            .json(request)
            .send()
            .await?;
        read_json(response).await
    }
}

impl OrderGateway for ApiClient {
    async fn create_order(
        &self,
        request: &CreateOrderRequest,
        idempotency_key: Uuid,
    ) -> Result<OrderCreated, SubmitError> {
        Self::create_order(self, request, idempotency_key)
            .await
            .map_err(SubmitError::from)
    }
}

/// Check the status and decode a JSON body.
async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    // Read as text first for better error diagnostics
    let body = response.text().await?;

    if !status.is_success() {
        let message = describe_error_body(status.as_u16(), &body);
        tracing::warn!(
            status = %status,
            body = %body.chars().take(500).collect::<String>(),
            "API returned non-success status"
        );
        return Err(match status {
            StatusCode::NOT_FOUND => ApiError::NotFound(message),
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized(message),
            _ => ApiError::Status {
                status: status.as_u16(),
                message,
            },
        });
    }

    serde_json::from_str(&body).map_err(|e| {
        tracing::error!(
            error = %e,
            body = %body.chars().take(500).collect::<String>(),
            "Failed to parse API response"
        );
        ApiError::Parse(e)
    })
    .inspect(|_| debug!(status = %status, "API response decoded"))
}
