//! Stateful checkout flow.
//!
//! [`CheckoutFlow`] walks the buyer through shipping, payment and review,
//! validating each stage with the rules from [`cartflow_core::checkout`], and
//! submits the order through an [`OrderGateway`].
//!
//! # Lifecycle
//!
//! ```text
//! Shipping --advance--> Payment --advance--> Review --place_order--> done
//!    ^                     |                   |
//!    +-------back----------+<-------back-------+
//! ```
//!
//! A failed submission keeps the flow in `Review` with the cart and the
//! entered data untouched, so the buyer can retry. A successful submission
//! clears the cart and completes the flow; every later call returns
//! [`CheckoutError::Completed`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use cartflow_core::checkout::{filter_cvv, filter_postal_code, format_card_number, format_phone};
use cartflow_core::{
    CheckoutStage, OrderId, PaymentDetails, Quote, ShippingDetails, ShippingPolicy, UserProfile,
    ValidationError, YearMonth,
};

use crate::api::{CreateOrderRequest, GENERIC_ERROR_MESSAGE, OrderCreated};
use crate::cart::CartStore;

/// Something that can create orders.
///
/// Implemented by [`crate::api::ApiClient`]; tests substitute fakes.
pub trait OrderGateway: Send + Sync {
    /// Create an order. Calls carrying the same `idempotency_key` must not
    /// create more than one order.
    fn create_order(
        &self,
        request: &CreateOrderRequest,
        idempotency_key: Uuid,
    ) -> impl Future<Output = Result<OrderCreated, SubmitError>> + Send;
}

/// Why an order submission failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The API answered with an error status.
    #[error("order rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// No answer within the submission timeout.
    #[error("order submission timed out")]
    Timeout,

    /// The API could not be reached.
    #[error("network error: {0}")]
    Network(String),

    /// The API answered success with a body we could not read.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl SubmitError {
    /// Whether retrying the same submission may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Network(_) => true,
            Self::Rejected { status, .. } => *status >= 500,
            Self::InvalidResponse(_) => false,
        }
    }

    /// Message shown on the review stage.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected { message, .. } => message.clone(),
            Self::Timeout => {
                "The order service did not respond in time. Please try again.".to_owned()
            }
            Self::Network(_) => {
                "Could not connect to the order service. Please try again.".to_owned()
            }
            Self::InvalidResponse(_) => GENERIC_ERROR_MESSAGE.to_owned(),
        }
    }
}

/// Errors returned by [`CheckoutFlow`].
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("The cart is empty")]
    EmptyCart,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    /// The operation is not available in the current stage.
    #[error("cannot {action} during the {stage} stage")]
    WrongStage {
        stage: CheckoutStage,
        action: &'static str,
    },

    /// The order was already placed.
    #[error("checkout already completed")]
    Completed,
}

/// Checkout tunables, usually built from configuration.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub shipping: ShippingPolicy,
    /// Upper bound on a single order submission.
    pub submit_timeout: Duration,
    /// Country applied to fresh shipping details.
    pub default_country: String,
    /// Prefix enforced on phone numbers typed with a leading `+`.
    pub phone_prefix: String,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            shipping: ShippingPolicy::default(),
            submit_timeout: Duration::from_secs(10),
            default_country: "Argentina".to_owned(),
            phone_prefix: "+54".to_owned(),
        }
    }
}

/// What the buyer sees after a successful order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderConfirmation {
    pub order_id: OrderId,
    /// Total as reported by the API.
    pub total: Decimal,
    pub recipient: String,
    pub shipping_address: String,
    pub item_count: u64,
}

/// One checkout session over the shared cart.
///
/// Entered data lives only as long as the flow; dropping it abandons the
/// checkout.
pub struct CheckoutFlow {
    cart: Arc<CartStore>,
    settings: CheckoutSettings,
    stage: CheckoutStage,
    shipping: ShippingDetails,
    payment: PaymentDetails,
    last_error: Option<String>,
    idempotency_key: Uuid,
    /// Last request sent under `idempotency_key`.
    submitted: Option<CreateOrderRequest>,
    confirmation: Option<OrderConfirmation>,
}

impl CheckoutFlow {
    /// Begin a checkout, prefilling shipping details from `profile` when
    /// available.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` if there is nothing to buy.
    pub fn start(
        cart: Arc<CartStore>,
        profile: Option<&UserProfile>,
        settings: CheckoutSettings,
    ) -> Result<Self, CheckoutError> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let shipping = profile.map_or_else(
            || ShippingDetails::with_country(settings.default_country.clone()),
            |p| ShippingDetails::from_profile(p, settings.default_country.clone()),
        );

        debug!(prefilled = profile.is_some(), "checkout started");

        Ok(Self {
            cart,
            settings,
            stage: CheckoutStage::Shipping,
            shipping,
            payment: PaymentDetails::default(),
            last_error: None,
            idempotency_key: Uuid::new_v4(),
            submitted: None,
            confirmation: None,
        })
    }

    #[must_use]
    pub const fn stage(&self) -> CheckoutStage {
        self.stage
    }

    #[must_use]
    pub const fn shipping(&self) -> &ShippingDetails {
        &self.shipping
    }

    #[must_use]
    pub const fn payment(&self) -> &PaymentDetails {
        &self.payment
    }

    /// The cart being checked out.
    #[must_use]
    pub const fn cart(&self) -> &Arc<CartStore> {
        &self.cart
    }

    #[must_use]
    pub const fn settings(&self) -> &CheckoutSettings {
        &self.settings
    }

    /// The message currently shown to the buyer, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }

    /// Set once the order has been placed.
    #[must_use]
    pub const fn confirmation(&self) -> Option<&OrderConfirmation> {
        self.confirmation.as_ref()
    }

    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.confirmation.is_some()
    }

    /// Totals for the current cart, computed fresh.
    #[must_use]
    pub fn quote(&self) -> Quote {
        self.settings.shipping.quote(&self.cart.snapshot())
    }

    /// Editable shipping details. Only available in the shipping stage.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::WrongStage` outside the shipping stage.
    pub fn shipping_mut(&mut self) -> Result<&mut ShippingDetails, CheckoutError> {
        self.require(CheckoutStage::Shipping, "edit shipping details")?;
        Ok(&mut self.shipping)
    }

    /// Editable payment details. Only available in the payment stage.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::WrongStage` outside the payment stage.
    pub fn payment_mut(&mut self) -> Result<&mut PaymentDetails, CheckoutError> {
        self.require(CheckoutStage::Payment, "edit payment details")?;
        Ok(&mut self.payment)
    }

    /// Set the phone number through the phone input filter.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::WrongStage` outside the shipping stage.
    pub fn set_phone(&mut self, input: &str) -> Result<(), CheckoutError> {
        let phone = format_phone(input, &self.settings.phone_prefix);
        self.shipping_mut()?.phone = phone;
        Ok(())
    }

    /// Set the postal code through the postal code input filter.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::WrongStage` outside the shipping stage.
    pub fn set_postal_code(&mut self, input: &str) -> Result<(), CheckoutError> {
        self.shipping_mut()?.postal_code = filter_postal_code(input);
        Ok(())
    }

    /// Set the card number, grouped in blocks of four. Input longer than 16
    /// digits leaves the current value unchanged.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::WrongStage` outside the payment stage.
    pub fn set_card_number(&mut self, input: &str) -> Result<(), CheckoutError> {
        let payment = self.payment_mut()?;
        payment.card_number = format_card_number(input, &payment.card_number);
        Ok(())
    }

    /// Set the CVV through the CVV input filter.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::WrongStage` outside the payment stage.
    pub fn set_cvv(&mut self, input: &str) -> Result<(), CheckoutError> {
        self.payment_mut()?.cvv = filter_cvv(input);
        Ok(())
    }

    /// Replace the shipping details with values from `profile`.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::WrongStage` outside the shipping stage.
    pub fn reload_profile(&mut self, profile: &UserProfile) -> Result<(), CheckoutError> {
        self.require(CheckoutStage::Shipping, "reload profile data")?;
        self.shipping = ShippingDetails::from_profile(profile, self.settings.default_country.clone());
        Ok(())
    }

    /// Validate the current stage and move forward, using today's date for
    /// the card expiry check.
    ///
    /// # Errors
    ///
    /// See [`Self::advance_at`].
    pub fn advance(&mut self) -> Result<CheckoutStage, CheckoutError> {
        self.advance_at(YearMonth::current())
    }

    /// Validate the current stage and move forward.
    ///
    /// On a validation failure the stage is unchanged, every entered value is
    /// kept and the first failing rule becomes [`Self::last_error`].
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Validation` for invalid data,
    /// `CheckoutError::WrongStage` from the review stage (use
    /// [`Self::place_order`]) and `CheckoutError::Completed` after the order
    /// was placed.
    pub fn advance_at(&mut self, today: YearMonth) -> Result<CheckoutStage, CheckoutError> {
        self.ensure_active()?;
        if self.stage == CheckoutStage::Review {
            return Err(CheckoutError::WrongStage {
                stage: self.stage,
                action: "advance",
            });
        }

        match self.stage.advance(&self.shipping, &self.payment, today) {
            Ok(next) => {
                debug!(from = %self.stage, to = %next, "checkout stage advanced");
                self.stage = next;
                self.last_error = None;
                Ok(next)
            }
            Err(e) => {
                debug!(stage = %self.stage, error = %e, "checkout stage blocked");
                self.last_error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Move back one stage, keeping every entered value.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Completed` after the order was placed.
    pub fn back(&mut self) -> Result<CheckoutStage, CheckoutError> {
        self.ensure_active()?;
        if self.stage == CheckoutStage::Review {
            self.renew_idempotency_key();
        }
        self.stage = self.stage.back();
        self.last_error = None;
        Ok(self.stage)
    }

    /// Submit the order.
    ///
    /// On success the cart is cleared, payment data is dropped and the flow
    /// completes. On failure the flow stays in review with a user-readable
    /// [`Self::last_error`], and calling again retries. A retry reuses the
    /// idempotency key only while the request is identical to the one last
    /// sent; if the cart changed in between, the order gets a fresh key.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Submit` if the gateway fails or does not answer
    /// within the submission timeout, `CheckoutError::EmptyCart` if the cart
    /// was emptied meanwhile, and `CheckoutError::WrongStage` before review.
    #[instrument(skip(self, gateway))]
    pub async fn place_order<G: OrderGateway>(
        &mut self,
        gateway: &G,
    ) -> Result<OrderConfirmation, CheckoutError> {
        self.ensure_active()?;
        self.require(CheckoutStage::Review, "place the order")?;

        let cart = self.cart.snapshot();
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let shipping_address = self.shipping.compose_address();
        let request = CreateOrderRequest::from_cart(&cart, shipping_address.clone());
        if self
            .submitted
            .as_ref()
            .is_some_and(|previous| *previous != request)
        {
            debug!("order contents changed since the last attempt");
            self.renew_idempotency_key();
        }
        self.submitted = Some(request.clone());
        debug!(idempotency_key = %self.idempotency_key, "submitting order");

        let result = tokio::time::timeout(
            self.settings.submit_timeout,
            gateway.create_order(&request, self.idempotency_key),
        )
        .await
        .unwrap_or(Err(SubmitError::Timeout));

        match result {
            Ok(created) => {
                self.cart.clear();
                self.payment = PaymentDetails::default();
                self.last_error = None;

                let confirmation = OrderConfirmation {
                    order_id: created.order_id,
                    total: created.total,
                    recipient: self.shipping.full_name.clone(),
                    shipping_address,
                    item_count: cart.total_items(),
                };
                info!(
                    order_id = %confirmation.order_id,
                    total = %confirmation.total,
                    items = confirmation.item_count,
                    "order placed"
                );
                self.confirmation = Some(confirmation.clone());
                Ok(confirmation)
            }
            Err(e) => {
                warn!(error = %e, retryable = e.is_retryable(), "order submission failed");
                self.last_error = Some(e.user_message());
                Err(e.into())
            }
        }
    }

    fn renew_idempotency_key(&mut self) {
        self.idempotency_key = Uuid::new_v4();
        self.submitted = None;
    }

    const fn ensure_active(&self) -> Result<(), CheckoutError> {
        if self.confirmation.is_some() {
            return Err(CheckoutError::Completed);
        }
        Ok(())
    }

    fn require(&self, stage: CheckoutStage, action: &'static str) -> Result<(), CheckoutError> {
        self.ensure_active()?;
        if self.stage == stage {
            Ok(())
        } else {
            Err(CheckoutError::WrongStage {
                stage: self.stage,
                action,
            })
        }
    }
}

impl std::fmt::Debug for CheckoutFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutFlow")
            .field("stage", &self.stage)
            .field("shipping", &self.shipping)
            .field("payment", &self.payment)
            .field("last_error", &self.last_error)
            .field("confirmation", &self.confirmation)
            .finish_non_exhaustive()
    }
}
