//! Line item quantity.

use core::fmt;
use core::num::NonZeroU32;

use serde::{Deserialize, Serialize};

/// Errors that can occur when building a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityError {
    /// Zero or negative; such a line must be removed instead.
    #[error("quantity must be at least 1 (got {0})")]
    NotPositive(i64),
    /// Larger than the store column can hold.
    #[error("quantity must be at most {max} (got {got})")]
    TooLarge {
        /// Maximum allowed quantity.
        max: u32,
        /// Requested quantity.
        got: i64,
    },
}

/// A strictly positive quantity of one product in a cart.
///
/// A line item with quantity zero cannot be represented; a mutation that
/// would produce one has to remove the line instead.
///
/// ```
/// use stg_catalog_core::Quantity;
///
/// assert_eq!(Quantity::try_from_i64(2).unwrap().get(), 2);
/// assert!(Quantity::try_from_i64(0).is_err());
/// assert!(Quantity::try_from_i64(-3).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct Quantity(NonZeroU32);

impl Quantity {
    /// A single unit.
    pub const ONE: Self = Self(NonZeroU32::MIN);

    /// Upper bound, matching the `INTEGER` column in the store.
    pub const MAX: u32 = i32::MAX.unsigned_abs();

    /// Create a quantity, returning `None` for zero.
    #[must_use]
    pub fn new(value: u32) -> Option<Self> {
        if value > Self::MAX {
            return None;
        }
        NonZeroU32::new(value).map(Self)
    }

    /// Create a quantity from a signed request value.
    ///
    /// # Errors
    ///
    /// Returns [`QuantityError::NotPositive`] for values `<= 0` and
    /// [`QuantityError::TooLarge`] above [`Quantity::MAX`].
    pub fn try_from_i64(value: i64) -> Result<Self, QuantityError> {
        if value <= 0 {
            return Err(QuantityError::NotPositive(value));
        }
        u32::try_from(value)
            .ok()
            .and_then(Self::new)
            .ok_or(QuantityError::TooLarge {
                max: Self::MAX,
                got: value,
            })
    }

    /// The quantity as a plain integer.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0.get()
    }

    /// The quantity after adding one unit, saturating at [`Quantity::MAX`].
    #[must_use]
    pub fn incremented(self) -> Self {
        Self::new(self.get().saturating_add(1)).unwrap_or(self)
    }

    /// The quantity as stored in the `cart_items.quantity` column.
    #[must_use]
    pub fn as_i32(&self) -> i32 {
        i32::try_from(self.get()).unwrap_or(i32::MAX)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for Quantity {
    type Error = QuantityError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::try_from_i64(value)
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.get()
    }
}
