//! Checkout transitions and the order handoff.

use tracing::{info, instrument};

use stg_catalog_core::{CheckoutForm, CheckoutState, OrderLink};

use super::{CartError, CartService, LineItemStore, require_identity};
use crate::error::add_breadcrumb;
use crate::models::CurrentIdentity;

impl<S: LineItemStore> CartService<S> {
    /// Open the order form.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Checkout(CheckoutError::EmptyCart)` for an empty
    /// cart, plus the identity and store errors of [`CartService::cart`].
    #[instrument(skip(self, identity))]
    pub async fn begin_checkout(
        &self,
        identity: Option<&CurrentIdentity>,
    ) -> Result<CheckoutState, CartError> {
        let identity = require_identity(identity)?;
        let session = self.session(identity.user_id).await;
        let mut state = session.state.lock().await;

        let cart = self.load(identity.user_id, &mut state).await?.clone();
        let next = state.checkout.begin(&cart)?;
        state.checkout = next.clone();
        Ok(next)
    }

    /// Close the order form without ordering.
    ///
    /// # Errors
    ///
    /// Returns `CartError::IdentityMissing` without a signed-in user.
    #[instrument(skip(self, identity))]
    pub async fn cancel_checkout(
        &self,
        identity: Option<&CurrentIdentity>,
    ) -> Result<CheckoutState, CartError> {
        let identity = require_identity(identity)?;
        let session = self.session(identity.user_id).await;
        let mut state = session.state.lock().await;

        state.checkout = state.checkout.cancel();
        Ok(state.checkout.clone())
    }

    /// Whether the submit control is enabled for `form`.
    ///
    /// # Errors
    ///
    /// Returns the identity and store errors of [`CartService::cart`].
    pub async fn can_submit(
        &self,
        identity: Option<&CurrentIdentity>,
        form: &CheckoutForm,
    ) -> Result<bool, CartError> {
        let identity = require_identity(identity)?;
        let session = self.session(identity.user_id).await;
        let mut state = session.state.lock().await;

        let cart = self.load(identity.user_id, &mut state).await?.clone();
        Ok(state.checkout.can_submit(form, &identity.contact, &cart))
    }

    /// Compose the order from the confirmed cart and return the handoff link.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Checkout` if the form is incomplete, the cart is
    /// empty or the order form is not open, plus the identity and store errors
    /// of [`CartService::cart`].
    #[instrument(skip(self, identity, form))]
    pub async fn place_order(
        &self,
        identity: Option<&CurrentIdentity>,
        form: &CheckoutForm,
    ) -> Result<OrderLink, CartError> {
        let identity = require_identity(identity)?;
        let session = self.session(identity.user_id).await;
        let mut state = session.state.lock().await;

        let cart = self.load(identity.user_id, &mut state).await?.clone();
        let (next, link) =
            state
                .checkout
                .submit(form, &identity.contact, &cart, &self.inner.settings.channel)?;
        state.checkout = next;

        info!(
            user_id = %identity.user_id,
            lines = cart.len(),
            total = %cart.total(),
            "Order handed off"
        );
        let lines = cart.len().to_string();
        add_breadcrumb("checkout", "Order handed off", Some(&[("lines", lines.as_str())]));

        Ok(link)
    }
}
