//! Business logic services for storefront.
//!
//! # Services
//!
//! - `cart` - cart reconciliation, view model sync and the checkout handoff
//! - `identity` - signatures on the identity backend's sign-in handoff

pub mod cart;
pub mod identity;

pub use cart::{CartError, CartService, CartSettings, CartSnapshot};
pub use identity::{IdentityVerifier, SignatureError};
