//! Monetary amounts using exact decimal arithmetic.
//!
//! All cart arithmetic happens on [`Decimal`]; nothing is converted to a float.
//! Rounding to the two-decimal display granularity happens only when an amount
//! is rendered.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, Mul};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::Quantity;

/// A non-currency-tagged amount of money.
///
/// The storefront sells in a single currency, so the currency lives in
/// configuration and display rather than on every value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Number of decimal places shown to customers.
    pub const DISPLAY_SCALE: u32 = 2;

    /// Wrap a decimal amount.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Build an amount from minor units (e.g. centavos).
    #[must_use]
    pub fn from_minor(minor: i64) -> Self {
        Self(Decimal::new(minor, Self::DISPLAY_SCALE))
    }

    /// The exact, unrounded amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// The amount rounded half away from zero to the display scale.
    #[must_use]
    pub fn rounded(&self) -> Decimal {
        self.0
            .round_dp_with_strategy(Self::DISPLAY_SCALE, RoundingStrategy::MidpointAwayFromZero)
    }

    /// Format with exactly two decimals and no currency symbol (e.g. `"39.80"`).
    #[must_use]
    pub fn format_amount(&self) -> String {
        format!("{:.2}", self.rounded())
    }

    /// Format with the currency symbol (e.g. `"R$ 39.80"`).
    #[must_use]
    pub fn display(&self, currency: CurrencyCode) -> String {
        format!("{} {}", currency.symbol(), self.format_amount())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_amount())
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Mul<Quantity> for Money {
    type Output = Self;

    fn mul(self, rhs: Quantity) -> Self {
        Self(self.0 * Decimal::from(rhs.get()))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Self> for Money {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

/// ISO 4217 currency codes the storefront can display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    BRL,
    USD,
    EUR,
}

impl CurrencyCode {
    /// Symbol printed in front of amounts.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::BRL => "R$",
            Self::USD => "$",
            Self::EUR => "€",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_format_pads_to_two_decimals() {
        assert_eq!(Money::new(dec!(5)).format_amount(), "5.00");
        assert_eq!(Money::new(dec!(39.8)).format_amount(), "39.80");
    }

    #[test]
    fn test_format_rounds_half_away_from_zero() {
        assert_eq!(Money::new(dec!(1.005)).format_amount(), "1.01");
        assert_eq!(Money::new(dec!(1.004)).format_amount(), "1.00");
    }

    #[test]
    fn test_multiply_by_quantity_is_exact() {
        let unit = Money::new(dec!(19.90));
        let line = unit * Quantity::new(3).unwrap();
        assert_eq!(line.amount(), dec!(59.70));
    }

    #[test]
    fn test_sum_has_no_float_drift() {
        let total: Money = std::iter::repeat_n(Money::new(dec!(0.1)), 10).sum();
        assert_eq!(total.amount(), dec!(1.0));
        assert_eq!(total.to_string(), "1.00");
    }

    #[test]
    fn test_display_with_currency() {
        assert_eq!(Money::from_minor(4480).display(CurrencyCode::BRL), "R$ 44.80");
    }

    #[test]
    fn test_serde_uses_string_decimal() {
        let json = serde_json::to_string(&Money::new(dec!(19.90))).unwrap();
        assert_eq!(json, "\"19.90\"");
    }
}
