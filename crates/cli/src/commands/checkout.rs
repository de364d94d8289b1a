//! Interactive checkout.
//!
//! Prompts for shipping details, then payment details, then shows a review
//! and submits the order. Pressing Enter on a field keeps its current value.
//! Closing the input abandons the checkout and leaves the cart untouched.

use std::fmt::Display;
use std::io::{self, BufRead, Write};

use cartflow_core::checkout::{CARD_DIGITS, digits};
use cartflow_core::{CheckoutStage, UserProfile, format_amount};
use cartflow_storefront::{
    AppError, AppState, CheckoutError, CheckoutFlow, OrderConfirmation, OrderGateway,
};
use thiserror::Error;

use super::cart::{render_lines, render_quote};

/// Errors raised while driving the checkout prompts.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// Input reached end of file.
    #[error("input closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Flow(#[from] CheckoutError),
}

/// Line-oriented prompt over any reader and writer.
pub struct Console<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub const fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn say(&mut self, text: impl Display) -> Result<(), ConsoleError> {
        writeln!(self.output, "{text}")?;
        Ok(())
    }

    fn ask(&mut self, prompt: &str) -> Result<String, ConsoleError> {
        write!(self.output, "{prompt}: ")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(ConsoleError::Closed);
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_owned())
    }

    /// Ask for a value, showing `hint` as the current one. Blank input
    /// returns `None`.
    fn field_with_hint(&mut self, label: &str, hint: &str) -> Result<Option<String>, ConsoleError> {
        let prompt = if hint.is_empty() {
            label.to_owned()
        } else {
            format!("{label} [{hint}]")
        };
        let answer = self.ask(&prompt)?;
        Ok(Some(answer).filter(|a| !a.trim().is_empty()))
    }

    /// Ask for a value, keeping `current` on blank input.
    fn field(&mut self, label: &str, current: &str) -> Result<String, ConsoleError> {
        Ok(self
            .field_with_hint(label, current)?
            .unwrap_or_else(|| current.to_owned()))
    }
}

/// Run the checkout against the configured API on stdin and stdout.
///
/// # Errors
///
/// Returns an error if the cart is empty or the terminal cannot be used.
pub async fn run(state: &AppState) -> Result<(), Box<dyn std::error::Error>> {
    let profile = state.profile().await;
    let mut flow = state
        .begin_checkout(profile.as_ref())
        .map_err(AppError::from)?;

    let mut console = Console::new(io::stdin().lock(), io::stdout());
    let confirmation = drive(&mut flow, state.api(), profile.as_ref(), &mut console).await?;
    if confirmation.is_none() {
        tracing::info!(stage = %flow.stage(), "checkout abandoned");
    }
    Ok(())
}

/// Drive `flow` until the order is placed or the buyer quits.
///
/// Returns the confirmation, or `None` if the checkout was abandoned.
///
/// # Errors
///
/// Returns an error if the console cannot be written.
pub async fn drive<G, R, W>(
    flow: &mut CheckoutFlow,
    gateway: &G,
    profile: Option<&UserProfile>,
    console: &mut Console<R, W>,
) -> Result<Option<OrderConfirmation>, ConsoleError>
where
    G: OrderGateway,
    R: BufRead,
    W: Write,
{
    match run_stages(flow, gateway, profile, console).await {
        Err(ConsoleError::Closed) => Ok(None),
        other => other,
    }
}

async fn run_stages<G, R, W>(
    flow: &mut CheckoutFlow,
    gateway: &G,
    profile: Option<&UserProfile>,
    console: &mut Console<R, W>,
) -> Result<Option<OrderConfirmation>, ConsoleError>
where
    G: OrderGateway,
    R: BufRead,
    W: Write,
{
    loop {
        let stage = flow.stage();
        console.say(format_args!("\n== Step {} of 3: {stage} ==", stage.step()))?;

        let choice = match stage {
            CheckoutStage::Shipping => {
                edit_shipping(flow, console)?;
                console.ask("[n]ext, [p]rofile data, [q]uit")?
            }
            CheckoutStage::Payment => {
                edit_payment(flow, console)?;
                console.ask("[n]ext, [b]ack, [q]uit")?
            }
            CheckoutStage::Review => {
                show_review(flow, console)?;
                console.ask("[c]onfirm order, [b]ack, [q]uit")?
            }
        };

        match (stage, choice.trim().to_lowercase().as_str()) {
            (_, "q") => return Ok(None),
            (CheckoutStage::Payment | CheckoutStage::Review, "b") => {
                flow.back()?;
            }
            (CheckoutStage::Shipping, "p") => match profile {
                Some(profile) => flow.reload_profile(profile)?,
                None => console.say("No profile data available")?,
            },
            (CheckoutStage::Shipping | CheckoutStage::Payment, "n" | "") => {
                if flow.advance().is_err() {
                    report_error(flow, console)?;
                }
            }
            (CheckoutStage::Review, "c") => match flow.place_order(gateway).await {
                Ok(confirmation) => {
                    show_confirmation(&confirmation, console)?;
                    return Ok(Some(confirmation));
                }
                Err(CheckoutError::Submit(_)) => {
                    report_error(flow, console)?;
                    console.say("Your cart was kept. Choose [c] to try again.")?;
                }
                Err(e) => return Err(e.into()),
            },
            _ => console.say("Unknown choice")?,
        }
    }
}

fn report_error<R: BufRead, W: Write>(
    flow: &mut CheckoutFlow,
    console: &mut Console<R, W>,
) -> Result<(), ConsoleError> {
    if let Some(message) = flow.last_error() {
        console.say(format_args!("Error: {message}"))?;
    }
    flow.dismiss_error();
    Ok(())
}

fn edit_shipping<R: BufRead, W: Write>(
    flow: &mut CheckoutFlow,
    console: &mut Console<R, W>,
) -> Result<(), ConsoleError> {
    let current = flow.shipping().clone();

    let full_name = console.field("Full name", &current.full_name)?;
    let email = console.field("Email", &current.email)?;
    let phone = console.field("Phone", &current.phone)?;
    let address = console.field("Address", &current.address)?;
    let city = console.field("City", &current.city)?;
    let state = console.field("State/Province", &current.state)?;
    let postal_code = console.field("Postal code", &current.postal_code)?;
    let country = console.field("Country", &current.country)?;
    let notes = console.field("Delivery notes", current.notes.as_deref().unwrap_or_default())?;

    let shipping = flow.shipping_mut()?;
    shipping.full_name = full_name;
    shipping.email = email;
    shipping.address = address;
    shipping.city = city;
    shipping.state = state;
    shipping.country = country;
    shipping.notes = Some(notes).filter(|n| !n.trim().is_empty());

    flow.set_phone(&phone)?;
    flow.set_postal_code(&postal_code)?;
    Ok(())
}

fn edit_payment<R: BufRead, W: Write>(
    flow: &mut CheckoutFlow,
    console: &mut Console<R, W>,
) -> Result<(), ConsoleError> {
    let current = flow.payment().clone();
    let card_hint = if current.card_number.is_empty() {
        String::new()
    } else {
        current.masked_card_number()
    };

    let card_number = console.field_with_hint("Card number", &card_hint)?;
    let cardholder_name = console.field("Name on card", &current.cardholder_name)?;
    let expiry_month = console.field("Expiry month (MM)", &current.expiry_month)?;
    let expiry_year = console.field("Expiry year (YYYY)", &current.expiry_year)?;
    let cvv_hint = if current.cvv.is_empty() { "" } else { "***" };
    let cvv = console.field_with_hint("CVV", cvv_hint)?;

    if let Some(card_number) = card_number {
        if digits(&card_number).len() > CARD_DIGITS {
            console.say("Card number can have at most 16 digits; kept the previous value")?;
        }
        flow.set_card_number(&card_number)?;
    }
    if let Some(cvv) = cvv {
        flow.set_cvv(&cvv)?;
    }

    let payment = flow.payment_mut()?;
    payment.cardholder_name = cardholder_name;
    payment.expiry_month = expiry_month;
    payment.expiry_year = expiry_year;
    Ok(())
}

fn show_review<R: BufRead, W: Write>(
    flow: &CheckoutFlow,
    console: &mut Console<R, W>,
) -> Result<(), ConsoleError> {
    let shipping = flow.shipping();
    let payment = flow.payment();

    console.say(format_args!("Ship to:  {}", shipping.full_name))?;
    console.say(format_args!("          {}", shipping.compose_address()))?;
    console.say(format_args!("Contact:  {} {}", shipping.phone, shipping.email))?;
    console.say(format_args!(
        "Card:     {} ({}, {}/{})",
        payment.masked_card_number(),
        payment.cardholder_name,
        payment.expiry_month,
        payment.expiry_year
    ))?;
    console.say("")?;

    let cart = flow.cart().snapshot();
    for line in render_lines(&cart) {
        console.say(line)?;
    }
    console.say("")?;
    for line in render_quote(&flow.quote()) {
        console.say(line)?;
    }
    Ok(())
}

fn show_confirmation<R: BufRead, W: Write>(
    confirmation: &OrderConfirmation,
    console: &mut Console<R, W>,
) -> Result<(), ConsoleError> {
    console.say(format_args!(
        "\nOrder #{} placed: {} items, total {}",
        confirmation.order_id,
        confirmation.item_count,
        format_amount(confirmation.total)
    ))?;
    console.say(format_args!(
        "Shipping to {}, {}",
        confirmation.recipient, confirmation.shipping_address
    ))
}
