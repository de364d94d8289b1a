//! Wire types for the storefront REST API.

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use cartflow_core::{Cart, OrderId, ProductId};

/// Body of `POST /orders/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItem>,
    pub shipping_address: String,
}

impl CreateOrderRequest {
    /// One order item per cart line, in cart order.
    #[must_use]
    pub fn from_cart(cart: &Cart, shipping_address: impl Into<String>) -> Self {
        Self {
            items: cart
                .items()
                .iter()
                .map(|line| OrderItem {
                    product_id: line.product_id,
                    quantity: line.quantity.get(),
                    unit_price: line.unit_price.amount(),
                })
                .collect(),
            shipping_address: shipping_address.into(),
        }
    }
}

/// One ordered product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
}

/// Successful response of `POST /orders/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreated {
    pub order_id: OrderId,
    pub total: Decimal,
}

/// Error body returned by the API.
///
/// `detail` is either a plain message or a list of validation entries. A
/// field of any other shape is treated as absent, so one odd field never
/// hides the others.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default, deserialize_with = "lenient")]
    detail: Option<ErrorDetail>,
    #[serde(default, deserialize_with = "lenient")]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Message(String),
    Validation(Vec<ValidationEntry>),
}

#[derive(Debug, Deserialize)]
struct ValidationEntry {
    #[serde(default, deserialize_with = "lenient")]
    msg: Option<String>,
}

/// Deserialize a field as `T`, or `None` if it has another shape.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Fallback when the error body carries nothing readable.
pub const GENERIC_ERROR_MESSAGE: &str = "Error processing the order";
const INVALID_DATA_MESSAGE: &str = "Invalid order data";
const UNPROCESSABLE_ENTITY: u16 = 422;

/// Turn an error response body into one human-readable message.
///
/// Validation entry messages are joined with `", "`, skipping entries
/// without one; a plain `detail` or `message` string is used as is; anything
/// else falls back to a generic message.
#[must_use]
pub fn describe_error_body(status: u16, body: &str) -> String {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();

    let messages: Vec<&str> = match &parsed.detail {
        Some(ErrorDetail::Validation(entries)) => entries
            .iter()
            .filter_map(|e| e.msg.as_deref())
            .filter(|m| !m.trim().is_empty())
            .collect(),
        _ => Vec::new(),
    };

    match &parsed.detail {
        Some(ErrorDetail::Validation(_)) if !messages.is_empty() => {
            format!("Validation errors: {}", messages.join(", "))
        }
        Some(ErrorDetail::Message(message)) if !message.trim().is_empty() => message.clone(),
        _ => match parsed.message.filter(|m| !m.trim().is_empty()) {
            Some(message) => message,
            None if status == UNPROCESSABLE_ENTITY => INVALID_DATA_MESSAGE.to_owned(),
            None => GENERIC_ERROR_MESSAGE.to_owned(),
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use cartflow_core::{Price, Product, SellerId};

    #[test]
    fn test_validation_entries_are_joined() {
        let body = r#"{"detail":[
            {"loc":["body","items",0,"quantity"],"msg":"quantity must be positive","type":"value_error"},
            {"loc":["body","items",1],"msg":"unknown product","type":"value_error"}
        ]}"#;
        assert_eq!(
            describe_error_body(422, body),
            "Validation errors: quantity must be positive, unknown product"
        );
    }

    #[test]
    fn test_plain_detail_is_used_as_is() {
        let body = r#"{"detail":"Insufficient stock for Notebook"}"#;
        assert_eq!(
            describe_error_body(400, body),
            "Insufficient stock for Notebook"
        );
    }

    #[test]
    fn test_message_field_fallback() {
        assert_eq!(
            describe_error_body(500, r#"{"message":"Database down"}"#),
            "Database down"
        );
    }

    #[test]
    fn test_unreadable_bodies_fall_back() {
        assert_eq!(describe_error_body(500, "<html>"), GENERIC_ERROR_MESSAGE);
        assert_eq!(describe_error_body(400, r#"{"detail":{"code":7}}"#), GENERIC_ERROR_MESSAGE);
        assert_eq!(describe_error_body(422, r#"{"detail":[]}"#), INVALID_DATA_MESSAGE);
    }

    #[test]
    fn test_entries_without_message_are_skipped() {
        let body = r#"{"detail":[
            {"loc":["body","items",0],"msg":"quantity exceeds stock"},
            {"loc":["body","items",1]},
            {"loc":["body","items",2],"msg":7},
            {"loc":["body","shippingAddress"],"msg":"address too long"}
        ]}"#;
        assert_eq!(
            describe_error_body(422, body),
            "Validation errors: quantity exceeds stock, address too long"
        );
        assert_eq!(
            describe_error_body(422, r#"{"detail":[{"loc":["body"]}]}"#),
            INVALID_DATA_MESSAGE
        );
    }

    #[test]
    fn test_odd_field_does_not_hide_the_other() {
        assert_eq!(
            describe_error_body(409, r#"{"detail":{"code":7},"message":"Stock changed"}"#),
            "Stock changed"
        );
        assert_eq!(
            describe_error_body(400, r#"{"detail":"Out of stock","message":{"code":7}}"#),
            "Out of stock"
        );
        assert_eq!(
            describe_error_body(500, r#"{"detail":null,"message":null}"#),
            GENERIC_ERROR_MESSAGE
        );
    }

    #[test]
    fn test_request_from_cart() {
        let mut cart = Cart::new();
        let product = Product {
            id: ProductId::new(4),
            name: "Lamp".into(),
            price: Price::new(Decimal::new(12_550, 2)).unwrap(),
            stock: None,
            seller_id: SellerId::new(1),
        };
        cart.add(&product, 1);
        cart.add(&product, 1);

        let request = CreateOrderRequest::from_cart(&cart, "Calle 1, CABA");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["items"][0]["productId"], 4);
        assert_eq!(json["items"][0]["quantity"], 2);
        assert_eq!(json["items"][0]["unitPrice"], 125.5);
        assert_eq!(json["shippingAddress"], "Calle 1, CABA");
    }

    #[test]
    fn test_order_created_accepts_numeric_total() {
        let created: OrderCreated =
            serde_json::from_str(r#"{"orderId":17,"total":25000.0}"#).unwrap();
        assert_eq!(created.order_id, OrderId::new(17));
        assert_eq!(created.total, Decimal::new(25_000, 0));
    }
}
