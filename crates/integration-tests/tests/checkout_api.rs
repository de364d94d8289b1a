//! Order submission against the stub backend.
//!
//! Drives [`CheckoutFlow`] through all three stages and submits with the real
//! [`ApiClient`], checking what reaches the wire and how the flow reacts.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use cartflow_core::{CheckoutStage, OrderId, Price, Product, ProductId, SellerId};
use cartflow_integration_tests::StubBackend;
use cartflow_storefront::api::ApiClient;
use cartflow_storefront::checkout::{CheckoutError, CheckoutSettings, SubmitError};
use cartflow_storefront::storage::MemoryStorage;
use cartflow_storefront::{CartStore, CheckoutFlow};
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

const TIMEOUT: Duration = Duration::from_secs(5);

fn product(id: i64, name: &str, cents: i64, stock: Option<u32>) -> Product {
    Product {
        id: ProductId::new(id),
        name: name.to_owned(),
        price: Price::new(Decimal::new(cents, 2)).expect("valid price"),
        stock,
        seller_id: SellerId::new(9),
    }
}

fn filled_cart() -> Arc<CartStore> {
    let store = CartStore::load(Arc::new(MemoryStorage::new()));
    let mate = product(7, "Mate", 2_000_000, Some(5));
    store.add_item(&mate, 1);
    store.add_item(&mate, 1);
    store.add_item(&product(8, "Bombilla", 450_050, None), 1);
    Arc::new(store)
}

fn settings(submit_timeout: Duration) -> CheckoutSettings {
    CheckoutSettings {
        submit_timeout,
        ..CheckoutSettings::default()
    }
}

/// A flow with valid shipping and payment data, sitting at review.
fn flow_at_review(cart: &Arc<CartStore>, settings: CheckoutSettings) -> CheckoutFlow {
    let mut flow = CheckoutFlow::start(Arc::clone(cart), None, settings).expect("cart not empty");

    let shipping = flow.shipping_mut().expect("shipping stage");
    shipping.full_name = "Ana Gomez".into();
    shipping.address = "Calle 1".into();
    shipping.city = "CABA".into();
    shipping.state = "Buenos Aires".into();
    shipping.notes = Some("Ring twice".into());
    flow.set_phone("+54 9 11 1234-5678").expect("shipping stage");
    flow.set_postal_code("1406").expect("shipping stage");
    assert_eq!(flow.advance().expect("valid shipping"), CheckoutStage::Payment);

    flow.set_card_number("4111111111111111").expect("payment stage");
    flow.set_cvv("123").expect("payment stage");
    let payment = flow.payment_mut().expect("payment stage");
    payment.cardholder_name = "Ana Gomez".into();
    payment.expiry_month = "12".into();
    payment.expiry_year = "2099".into();
    assert_eq!(flow.advance().expect("valid payment"), CheckoutStage::Review);

    flow
}

#[tokio::test]
async fn test_successful_order_clears_cart() {
    let stub = StubBackend::start().await.expect("stub backend");
    let client = ApiClient::new(&stub.api_config(Some("tok_3f9Zq81LmX"), TIMEOUT))
        .expect("client");
    let cart = filled_cart();
    let mut flow = flow_at_review(&cart, settings(TIMEOUT));

    let confirmation = flow.place_order(&client).await.expect("order placed");

    assert_eq!(confirmation.order_id, OrderId::new(1));
    assert_eq!(confirmation.total, Decimal::new(4_450_050, 2));
    assert_eq!(confirmation.item_count, 3);
    assert_eq!(confirmation.recipient, "Ana Gomez");
    assert_eq!(cart.total_items(), 0);
    assert!(flow.is_complete());

    let orders = stub.orders();
    assert_eq!(orders.len(), 1);
    let order = &orders[0];
    assert_eq!(
        order.body,
        json!({
            "items": [
                { "productId": 7, "quantity": 2, "unitPrice": 20000.0 },
                { "productId": 8, "quantity": 1, "unitPrice": 4500.5 },
            ],
            "shippingAddress": "Calle 1, CABA, Buenos Aires 1406, Argentina - Ring twice",
        })
    );
    assert_eq!(order.authorization.as_deref(), Some("Bearer tok_3f9Zq81LmX"));
    let key = order.idempotency_key.as_deref().expect("idempotency key");
    assert!(Uuid::parse_str(key).is_ok());
}

#[tokio::test]
async fn test_validation_array_keeps_cart_on_review() {
    let stub = StubBackend::start().await.expect("stub backend");
    stub.push_order_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        json!({
            "detail": [
                { "loc": ["body", "items", 0, "quantity"], "msg": "quantity exceeds stock" },
                { "loc": ["body", "shippingAddress"], "msg": "address too long" },
            ]
        }),
    );
    let client = ApiClient::new(&stub.api_config(None, TIMEOUT)).expect("client");
    let cart = filled_cart();
    let before = cart.snapshot();
    let mut flow = flow_at_review(&cart, settings(TIMEOUT));

    let err = flow.place_order(&client).await.expect_err("order rejected");

    assert!(matches!(
        err,
        CheckoutError::Submit(SubmitError::Rejected { status: 422, .. })
    ));
    assert_eq!(flow.stage(), CheckoutStage::Review);
    assert_eq!(
        flow.last_error(),
        Some("Validation errors: quantity exceeds stock, address too long")
    );
    assert_eq!(cart.snapshot(), before);
    assert_eq!(flow.shipping().full_name, "Ana Gomez");
    assert_eq!(flow.payment().cvv, "123");
}

#[tokio::test]
async fn test_unstructured_error_falls_back_to_generic_message() {
    let stub = StubBackend::start().await.expect("stub backend");
    stub.push_order_response(StatusCode::BAD_REQUEST, json!({ "detail": { "code": 17 } }));
    let client = ApiClient::new(&stub.api_config(None, TIMEOUT)).expect("client");
    let cart = filled_cart();
    let mut flow = flow_at_review(&cart, settings(TIMEOUT));

    flow.place_order(&client).await.expect_err("order rejected");

    assert_eq!(flow.last_error(), Some("Error processing the order"));
    assert_eq!(cart.total_items(), 3);
}

#[tokio::test]
async fn test_retry_after_server_error_reuses_idempotency_key() {
    let stub = StubBackend::start().await.expect("stub backend");
    stub.push_order_response(
        StatusCode::SERVICE_UNAVAILABLE,
        json!({ "detail": "Order service is restarting" }),
    );
    let client = ApiClient::new(&stub.api_config(None, TIMEOUT)).expect("client");
    let cart = filled_cart();
    let mut flow = flow_at_review(&cart, settings(TIMEOUT));

    let err = flow.place_order(&client).await.expect_err("first attempt fails");
    let CheckoutError::Submit(submit) = err else {
        panic!("expected a submission error, got {err:?}");
    };
    assert!(submit.is_retryable());
    assert_eq!(flow.last_error(), Some("Order service is restarting"));

    flow.place_order(&client).await.expect("retry succeeds");
    assert!(cart.is_empty());

    let orders = stub.orders();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].idempotency_key, orders[1].idempotency_key);
}

#[tokio::test]
async fn test_cart_change_before_retry_sends_new_idempotency_key() {
    let stub = StubBackend::start().await.expect("stub backend");
    stub.push_order_response(
        StatusCode::SERVICE_UNAVAILABLE,
        json!({ "detail": "Order service is restarting" }),
    );
    let client = ApiClient::new(&stub.api_config(None, TIMEOUT)).expect("client");
    let cart = filled_cart();
    let mut flow = flow_at_review(&cart, settings(TIMEOUT));

    flow.place_order(&client).await.expect_err("first attempt fails");
    cart.add_item(&product(99, "Yerba", 300_000, None), 1);
    let confirmation = flow.place_order(&client).await.expect("retry succeeds");

    assert_eq!(confirmation.item_count, 4);
    assert_eq!(confirmation.total, Decimal::new(4_750_050, 2));
    let orders = stub.orders();
    assert_eq!(orders.len(), 2);
    assert_ne!(orders[0].idempotency_key, orders[1].idempotency_key);
    assert_eq!(orders[1].body["items"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn test_stalled_backend_times_out() {
    let stub = StubBackend::start().await.expect("stub backend");
    stub.set_order_delay(Duration::from_secs(5));
    let short = Duration::from_millis(200);
    let client = ApiClient::new(&stub.api_config(None, short)).expect("client");
    let cart = filled_cart();
    let mut flow = flow_at_review(&cart, settings(short));

    let err = flow.place_order(&client).await.expect_err("times out");

    assert!(matches!(err, CheckoutError::Submit(SubmitError::Timeout)));
    assert_eq!(flow.stage(), CheckoutStage::Review);
    assert!(flow.last_error().is_some_and(|m| m.contains("try again")));
    assert_eq!(cart.total_items(), 3);
}

#[tokio::test]
async fn test_unreachable_backend_is_network_error() {
    let stub = StubBackend::start().await.expect("stub backend");
    let config = stub.api_config(None, TIMEOUT);
    drop(stub);
    // Give the aborted server a moment to release the port
    tokio::time::sleep(Duration::from_millis(50)).await;

    let client = ApiClient::new(&config).expect("client");
    let cart = filled_cart();
    let mut flow = flow_at_review(&cart, settings(TIMEOUT));

    let err = flow.place_order(&client).await.expect_err("no server");
    assert!(matches!(
        err,
        CheckoutError::Submit(SubmitError::Network(_) | SubmitError::Timeout)
    ));
    assert_eq!(cart.total_items(), 3);
}
