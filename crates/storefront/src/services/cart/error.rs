//! Cart service error types.

use thiserror::Error;

use stg_catalog_core::{CheckoutError, QuantityError};

use super::store::StoreError;

/// Errors surfaced by cart and checkout operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// No signed-in user; nothing was sent to the store.
    #[error("sign in to use the cart")]
    IdentityMissing,

    /// A requested quantity cannot be represented.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(#[from] QuantityError),

    /// The store call failed; the view model is unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A checkout transition was refused.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),
}

impl CartError {
    /// Whether the caller may retry the same request.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Store(err) => err.is_transient(),
            _ => false,
        }
    }
}
