//! Checkout state machine.
//!
//! ```text
//!              begin (cart not empty)           submit (form valid)
//!   Browsing ─────────────────────────▶ ComposingOrder ─────────────────▶ Dispatched
//!      ▲                                   │    ▲                           │
//!      └────────── cancel / cart emptied ──┘    └──────── begin ────────────┘
//! ```
//!
//! The state machine only decides *whether* a transition is allowed. Totals
//! come from [`Cart::total`] and the message from [`OrderDraft`]; neither
//! knows about this state.

use serde::{Deserialize, Serialize};

use crate::cart::Cart;
use crate::order::{HandoffChannel, OrderDraft, OrderLink};
use crate::types::PhoneNumberError;

/// Reasons a checkout transition is refused.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckoutError {
    /// Checkout was requested for a cart with no lines.
    #[error("cart is empty")]
    EmptyCart,
    /// The customer name field is blank.
    #[error("customer name is required")]
    MissingCustomerName,
    /// The signed-in user has no contact handle.
    #[error("contact handle is required")]
    MissingContactHandle,
    /// The phone number field is blank or not numeric.
    #[error("invalid phone number: {0}")]
    InvalidPhoneNumber(#[from] PhoneNumberError),
    /// An order can only be submitted while composing it.
    #[error("cannot submit an order while {0}")]
    NotComposing(CheckoutStage),
}

/// Stage of the checkout flow without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStage {
    #[default]
    Browsing,
    ComposingOrder,
    Dispatched,
}

impl std::fmt::Display for CheckoutStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Browsing => write!(f, "browsing"),
            Self::ComposingOrder => write!(f, "composing_order"),
            Self::Dispatched => write!(f, "dispatched"),
        }
    }
}

/// The order form as typed by the customer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutForm {
    /// Name to put in the message header.
    #[serde(default)]
    pub customer_name: String,
    /// Phone number the order is sent to, without country code.
    #[serde(default)]
    pub phone: String,
}

/// Where a user is in the checkout flow.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum CheckoutState {
    /// Looking at the cart; the order form is hidden.
    #[default]
    Browsing,
    /// The order form is open.
    ComposingOrder,
    /// A link was produced for the current cart.
    Dispatched {
        /// The link handed to the caller.
        link: OrderLink,
    },
}

impl CheckoutState {
    /// The stage without payload.
    #[must_use]
    pub const fn stage(&self) -> CheckoutStage {
        match self {
            Self::Browsing => CheckoutStage::Browsing,
            Self::ComposingOrder => CheckoutStage::ComposingOrder,
            Self::Dispatched { .. } => CheckoutStage::Dispatched,
        }
    }

    /// Whether the "place order" action is offered at all.
    #[must_use]
    pub fn can_begin(cart: &Cart) -> bool {
        !cart.is_empty()
    }

    /// Open the order form.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::EmptyCart`] if the cart has no lines.
    pub fn begin(&self, cart: &Cart) -> Result<Self, CheckoutError> {
        if !Self::can_begin(cart) {
            return Err(CheckoutError::EmptyCart);
        }
        Ok(Self::ComposingOrder)
    }

    /// Whether the submit control should be enabled for this form.
    #[must_use]
    pub fn can_submit(&self, form: &CheckoutForm, contact_handle: &str, cart: &Cart) -> bool {
        matches!(self, Self::ComposingOrder)
            && !cart.is_empty()
            && OrderDraft::compose(
                &form.customer_name,
                contact_handle,
                &form.phone,
                cart,
                cart.total(),
            )
            .is_ok()
    }

    /// Compose the order and produce the handoff link.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::NotComposing`] outside `ComposingOrder`,
    /// [`CheckoutError::EmptyCart`] for an empty cart, and the validation
    /// errors of [`OrderDraft::compose`] for an incomplete form.
    pub fn submit(
        &self,
        form: &CheckoutForm,
        contact_handle: &str,
        cart: &Cart,
        channel: &HandoffChannel,
    ) -> Result<(Self, OrderLink), CheckoutError> {
        if !matches!(self, Self::ComposingOrder) {
            return Err(CheckoutError::NotComposing(self.stage()));
        }
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let draft = OrderDraft::compose(
            &form.customer_name,
            contact_handle,
            &form.phone,
            cart,
            cart.total(),
        )?;
        let link = draft.link(channel);

        Ok((Self::Dispatched { link: link.clone() }, link))
    }

    /// Close the order form.
    #[must_use]
    pub const fn cancel(&self) -> Self {
        Self::Browsing
    }

    /// State after a confirmed cart mutation.
    ///
    /// A dispatched link no longer describes the cart, and an emptied cart
    /// cannot be ordered.
    #[must_use]
    pub fn after_cart_change(&self, cart: &Cart) -> Self {
        match self {
            Self::ComposingOrder if !cart.is_empty() => Self::ComposingOrder,
            _ => Self::Browsing,
        }
    }

    /// State after a confirmed write that took the cart from `previous` to
    /// `current`.
    ///
    /// A write that leaves the lines as they were keeps the state, so a
    /// dispatched link survives a same-value quantity update. `previous` is
    /// `None` when the cart was not loaded before the write.
    #[must_use]
    pub fn after_write(&self, previous: Option<&Cart>, current: &Cart) -> Self {
        if previous == Some(current) {
            return self.clone();
        }
        self.after_cart_change(current)
    }

    /// The produced link, once dispatched.
    #[must_use]
    pub const fn link(&self) -> Option<&OrderLink> {
        match self {
            Self::Dispatched { link } => Some(link),
            _ => None,
        }
    }
}
