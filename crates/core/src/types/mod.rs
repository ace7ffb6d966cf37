//! Core types for STG Catalog.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod money;
pub mod phone;
pub mod quantity;

pub use id::*;
pub use money::{CurrencyCode, Money};
pub use phone::{PhoneNumber, PhoneNumberError};
pub use quantity::{Quantity, QuantityError};
