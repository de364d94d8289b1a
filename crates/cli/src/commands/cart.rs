//! Cart inspection and editing commands.
//!
//! # Usage
//!
//! ```bash
//! cartflow cart show
//! cartflow cart add 42
//! cartflow cart update 42 3
//! cartflow cart remove 42
//! cartflow cart clear
//! cartflow quote
//! ```

use cartflow_core::{Cart, ProductId, Quote, format_amount};
use cartflow_storefront::{AppError, AppState, Result};

/// Print every cart line followed by the totals.
#[allow(clippy::print_stdout)]
pub fn show(state: &AppState) {
    let cart = state.cart().snapshot();
    if cart.is_empty() {
        println!("Your cart is empty");
        return;
    }

    for line in render_lines(&cart) {
        println!("{line}");
    }
    println!();
    for line in render_quote(&state.config().shipping.quote(&cart)) {
        println!("{line}");
    }
}

/// Fetch a product and add one unit of it.
///
/// # Errors
///
/// Returns an error if the product cannot be fetched, is out of stock, or
/// its line is already at the stock limit.
#[allow(clippy::print_stdout)]
pub async fn add(state: &AppState, product_id: ProductId, quantity: u32) -> Result<()> {
    let product = state.api().get_product(product_id).await?;

    if product.stock == Some(0) {
        return Err(AppError::BadRequest(format!(
            "{} is out of stock",
            product.name
        )));
    }
    if let Some(line) = state.cart().snapshot().get(product_id)
        && !line.can_increment()
    {
        return Err(AppError::BadRequest(format!(
            "Only {} of {} in stock",
            line.quantity, line.name
        )));
    }

    state.cart().add_item(&product, quantity);
    println!(
        "Added {} ({} items in cart)",
        product.name,
        state.cart().total_items()
    );
    Ok(())
}

/// Set a line's quantity. Zero or below removes the line.
#[allow(clippy::print_stdout)]
pub fn update(state: &AppState, product_id: ProductId, quantity: i64) {
    if state.cart().snapshot().get(product_id).is_none() {
        println!("Product {product_id} is not in the cart");
        return;
    }

    state.cart().update_quantity(product_id, quantity);
    match state.cart().snapshot().get(product_id) {
        Some(line) if line.exceeds_stock_cap() => println!(
            "Warning: {} has only {} in stock",
            line.name,
            line.stock_cap.unwrap_or_default()
        ),
        Some(line) => println!("{} x {}", line.quantity, line.name),
        None => println!("Removed product {product_id}"),
    }
}

#[allow(clippy::print_stdout)]
pub fn remove(state: &AppState, product_id: ProductId) {
    if state.cart().snapshot().get(product_id).is_none() {
        println!("Product {product_id} is not in the cart");
        return;
    }
    state.cart().remove_item(product_id);
    println!("Removed product {product_id}");
}

#[allow(clippy::print_stdout)]
pub fn clear(state: &AppState) {
    state.cart().clear();
    println!("Cart cleared");
}

/// Print subtotal, shipping and total for the current cart.
#[allow(clippy::print_stdout)]
pub fn quote(state: &AppState) {
    let cart = state.cart().snapshot();
    for line in render_quote(&state.config().shipping.quote(&cart)) {
        println!("{line}");
    }
}

/// One row per cart line: id, quantity, name, unit price and subtotal.
pub fn render_lines(cart: &Cart) -> Vec<String> {
    cart.items()
        .iter()
        .map(|line| {
            let cap = if line.is_at_stock_cap() {
                " (stock limit)"
            } else {
                ""
            };
            format!(
                "{:>6}  {:>3} x {:<28} {:>14}  {:>14}{cap}",
                line.product_id,
                line.quantity,
                line.name,
                line.unit_price.to_string(),
                format_amount(line.subtotal()),
            )
        })
        .collect()
}

pub fn render_quote(quote: &Quote) -> Vec<String> {
    let shipping = if quote.has_free_shipping() {
        "Free".to_owned()
    } else {
        format_amount(quote.shipping)
    };
    vec![
        format!("Items:    {}", quote.total_items),
        format!("Subtotal: {}", format_amount(quote.subtotal)),
        format!("Shipping: {shipping}"),
        format!("Total:    {}", format_amount(quote.total)),
    ]
}
