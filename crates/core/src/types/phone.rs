//! Customer phone number for the messaging handoff.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`PhoneNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneNumberError {
    /// The input is empty once formatting characters are removed.
    #[error("phone number cannot be empty")]
    Empty,
    /// The input contains something other than digits and separators.
    #[error("phone number may only contain digits (found {0:?})")]
    InvalidCharacter(char),
    /// More digits than any E.164 subscriber number.
    #[error("phone number must be at most {max} digits")]
    TooLong {
        /// Maximum allowed number of digits.
        max: usize,
    },
}

/// A phone number made of digits only, without the country code.
///
/// Customers type numbers the way they read them (`(81) 99999-9999`), so
/// spaces, dashes, dots and parentheses are dropped before validation.
///
/// ```
/// use stg_catalog_core::PhoneNumber;
///
/// let phone = PhoneNumber::parse("(81) 99999-9999").unwrap();
/// assert_eq!(phone.as_str(), "81999999999");
///
/// assert!(PhoneNumber::parse("").is_err());
/// assert!(PhoneNumber::parse("call me").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Maximum number of digits (E.164).
    pub const MAX_DIGITS: usize = 15;

    /// Parse a phone number, stripping common formatting characters.
    ///
    /// # Errors
    ///
    /// Returns an error if nothing but separators is given, if a character
    /// other than a digit or separator appears, or if there are too many digits.
    pub fn parse(s: &str) -> Result<Self, PhoneNumberError> {
        let mut digits = String::with_capacity(s.len());
        for c in s.chars() {
            match c {
                '0'..='9' => digits.push(c),
                ' ' | '-' | '.' | '(' | ')' => {}
                other => return Err(PhoneNumberError::InvalidCharacter(other)),
            }
        }

        if digits.is_empty() {
            return Err(PhoneNumberError::Empty);
        }

        if digits.len() > Self::MAX_DIGITS {
            return Err(PhoneNumberError::TooLong {
                max: Self::MAX_DIGITS,
            });
        }

        Ok(Self(digits))
    }

    /// The digits as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for PhoneNumber {
    type Err = PhoneNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = PhoneNumberError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(phone: PhoneNumber) -> Self {
        phone.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_digits() {
        assert_eq!(PhoneNumber::parse("81999999999").unwrap().as_str(), "81999999999");
    }

    #[test]
    fn test_parse_strips_separators() {
        let phone = PhoneNumber::parse(" 81 9.9999-9999 ").unwrap();
        assert_eq!(phone.as_str(), "81999999999");
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(PhoneNumber::parse(""), Err(PhoneNumberError::Empty));
        assert_eq!(PhoneNumber::parse(" - "), Err(PhoneNumberError::Empty));
    }

    #[test]
    fn test_parse_rejects_plus_and_letters() {
        assert_eq!(
            PhoneNumber::parse("+5581999999999"),
            Err(PhoneNumberError::InvalidCharacter('+'))
        );
        assert_eq!(
            PhoneNumber::parse("81x"),
            Err(PhoneNumberError::InvalidCharacter('x'))
        );
    }

    #[test]
    fn test_parse_too_long() {
        assert!(matches!(
            PhoneNumber::parse(&"9".repeat(16)),
            Err(PhoneNumberError::TooLong { max: 15 })
        ));
    }
}
