//! STG Catalog Core - Cart and order composition library.
//!
//! This crate holds the parts of the storefront that have real invariants:
//! - [`cart`] - the cart view model, line items and the total calculator
//! - [`order`] - the order composer and the messaging deep link
//! - [`checkout`] - the checkout state machine gating the handoff
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP. Persistence and the reconciliation round trips live in the
//! `storefront` crate, which drives these types.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, money, quantities and phone numbers

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod checkout;
pub mod order;
pub mod types;

pub use cart::{Cart, LineItem, total};
pub use checkout::{CheckoutError, CheckoutForm, CheckoutStage, CheckoutState};
pub use order::{HandoffChannel, HandoffConfigError, OrderDraft, OrderLine, OrderLineParseError, OrderLink};
pub use types::*;
