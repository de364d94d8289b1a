//! Integration tests for Cartflow.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p cartflow-integration-tests
//! ```
//!
//! Tests run against [`StubBackend`], an in-process `axum` server that mimics
//! the REST API on an ephemeral port. No external services are needed.
//!
//! # Test Categories
//!
//! - `checkout_api` - Order submission end to end
//! - `catalog_api` - Product and profile lookups
//! - `cart_persistence` - Cart files across restarts

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::{get, post};
use axum::{Json, Router};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use url::Url;

use cartflow_storefront::config::ApiConfig;

/// An order as received by the stub.
#[derive(Debug, Clone)]
pub struct RecordedOrder {
    pub body: Value,
    pub idempotency_key: Option<String>,
    pub authorization: Option<String>,
}

#[derive(Default)]
struct StubInner {
    order_responses: VecDeque<(StatusCode, Value)>,
    orders: Vec<RecordedOrder>,
    products: HashMap<i64, Value>,
    profile: Option<(String, Value)>,
    order_delay: Duration,
}

#[derive(Clone, Default)]
struct StubState {
    inner: Arc<Mutex<StubInner>>,
}

impl StubState {
    fn lock(&self) -> MutexGuard<'_, StubInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// In-process stand-in for the REST API.
///
/// Serves `POST /api/v1/orders/`, `GET /api/v1/products/{id}` and
/// `GET /api/v1/users/me/profile`. The server stops when dropped.
pub struct StubBackend {
    base_url: Url,
    state: StubState,
    handle: JoinHandle<()>,
}

impl StubBackend {
    /// Start the stub on an ephemeral localhost port.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start() -> std::io::Result<Self> {
        let state = StubState::default();
        let app = Router::new()
            .route("/api/v1/orders/", post(create_order))
            .route("/api/v1/products/{id}", get(get_product))
            .route("/api/v1/users/me/profile", get(get_profile))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let base_url =
            Url::parse(&format!("http://{addr}/api/v1/")).map_err(std::io::Error::other)?;
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            base_url,
            state,
            handle,
        })
    }

    /// Base URL of the stubbed API, ending in `/`.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Client configuration pointing at the stub.
    #[must_use]
    pub fn api_config(&self, token: Option<&str>, timeout: Duration) -> ApiConfig {
        ApiConfig {
            base_url: self.base_url.clone(),
            token: token.map(|t| SecretString::from(t.to_owned())),
            timeout,
        }
    }

    /// Queue the response for the next order. Unqueued orders are accepted
    /// with `201` and a computed total.
    pub fn push_order_response(&self, status: StatusCode, body: Value) {
        self.state.lock().order_responses.push_back((status, body));
    }

    /// Delay every order response.
    pub fn set_order_delay(&self, delay: Duration) {
        self.state.lock().order_delay = delay;
    }

    /// Serve `product` under its `id` field.
    pub fn add_product(&self, product: Value) {
        let id = product.get("id").and_then(Value::as_i64).unwrap_or_default();
        self.state.lock().products.insert(id, product);
    }

    /// Serve `profile` to requests bearing `token`.
    pub fn set_profile(&self, token: &str, profile: Value) {
        self.state.lock().profile = Some((format!("Bearer {token}"), profile));
    }

    /// Orders received so far, oldest first.
    #[must_use]
    pub fn orders(&self) -> Vec<RecordedOrder> {
        self.state.lock().orders.clone()
    }
}

impl Drop for StubBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn header_value(headers: &HeaderMap, name: impl header::AsHeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

async fn create_order(
    State(state): State<StubState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let (delay, queued, order_id) = {
        let mut inner = state.lock();
        inner.orders.push(RecordedOrder {
            body: body.clone(),
            idempotency_key: header_value(&headers, "idempotency-key"),
            authorization: header_value(&headers, header::AUTHORIZATION),
        });
        (
            inner.order_delay,
            inner.order_responses.pop_front(),
            inner.orders.len(),
        )
    };

    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    if let Some((status, response)) = queued {
        return (status, Json(response));
    }

    let total: f64 = body
        .get("items")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .map(|item| {
            let quantity = item.get("quantity").and_then(Value::as_f64).unwrap_or_default();
            let price = item.get("unitPrice").and_then(Value::as_f64).unwrap_or_default();
            quantity * price
        })
        .sum();

    (
        StatusCode::CREATED,
        Json(json!({ "orderId": order_id, "total": total })),
    )
}

async fn get_product(
    State(state): State<StubState>,
    Path(id): Path<i64>,
) -> (StatusCode, Json<Value>) {
    match state.lock().products.get(&id) {
        Some(product) => (StatusCode::OK, Json(product.clone())),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": "Product not found" })),
        ),
    }
}

async fn get_profile(
    State(state): State<StubState>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    let authorization = header_value(&headers, header::AUTHORIZATION);
    match &state.lock().profile {
        Some((expected, profile)) if authorization.as_ref() == Some(expected) => {
            (StatusCode::OK, Json(profile.clone()))
        }
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Not authenticated" })),
        ),
    }
}
