//! Order composer for the messaging handoff.
//!
//! An [`OrderDraft`] is assembled at checkout from the cart view model and the
//! customer's contact fields, rendered as a plain-text message and embedded in
//! a deep link of the form
//! `https://<host>/<country-code><phone>?text=<percent-encoded message>`.
//!
//! The message is read by a human on the other end, so its layout is part of
//! the contract:
//!
//! ```text
//! 👤 Cliente: Maria
//! 📧 Email: maria@example.com
//! 📦 PRODUTOS:
//! - Widget - Qtd: 2 - R$ 39.80
//! - Gadget - Qtd: 1 - R$ 5.00
//! 💰 TOTAL: R$ 44.80
//! ---
//! Pedido via STG Catalog
//! ```
//!
//! Nothing here opens the link; the caller decides what to do with it.

use core::fmt;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cart::{Cart, LineItem};
use crate::checkout::CheckoutError;
use crate::types::{CurrencyCode, Money, PhoneNumber, Quantity};

const CUSTOMER_LABEL: &str = "👤 Cliente: ";
const CONTACT_LABEL: &str = "📧 Email: ";
const PRODUCTS_LABEL: &str = "📦 PRODUTOS:";
const TOTAL_LABEL: &str = "💰 TOTAL: ";
const LINE_PREFIX: &str = "- ";
const QUANTITY_SEPARATOR: &str = " - Qtd: ";
const FOOTER_RULE: &str = "---";

/// Bytes escaped in the `text` parameter: everything except ASCII
/// alphanumerics and `- _ . ! ~ * ' ( )`, the set left alone by JavaScript's
/// `encodeURIComponent`.
const MESSAGE_ESCAPE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Errors building a [`HandoffChannel`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HandoffConfigError {
    /// The host is not a valid URL host.
    #[error("invalid messaging host: {0}")]
    InvalidHost(String),
    /// The country code is empty or not numeric.
    #[error("country code must be 1 to 3 digits (got {0:?})")]
    InvalidCountryCode(String),
}

/// Where and how the order message is handed off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffChannel {
    host: String,
    country_code: String,
    signature: String,
    currency: CurrencyCode,
}

impl HandoffChannel {
    /// Default messaging host.
    pub const DEFAULT_HOST: &'static str = "wa.me";
    /// Default country calling code (Brazil).
    pub const DEFAULT_COUNTRY_CODE: &'static str = "55";
    /// Default closing line of every message.
    pub const DEFAULT_SIGNATURE: &'static str = "Pedido via STG Catalog";

    /// Build a channel.
    ///
    /// # Errors
    ///
    /// Returns an error if `host` is not a bare host name or `country_code`
    /// is not 1-3 digits.
    pub fn new(
        host: &str,
        country_code: &str,
        signature: &str,
        currency: CurrencyCode,
    ) -> Result<Self, HandoffConfigError> {
        let parsed = Url::parse(&format!("https://{host}/"))
            .map_err(|_| HandoffConfigError::InvalidHost(host.to_owned()))?;
        if host.is_empty() || parsed.host_str() != Some(host) {
            return Err(HandoffConfigError::InvalidHost(host.to_owned()));
        }

        if country_code.is_empty()
            || country_code.len() > 3
            || !country_code.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(HandoffConfigError::InvalidCountryCode(
                country_code.to_owned(),
            ));
        }

        Ok(Self {
            host: host.to_owned(),
            country_code: country_code.to_owned(),
            signature: single_line(signature),
            currency,
        })
    }

    /// Messaging host (e.g. `wa.me`).
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Country calling code prefixed to the phone number.
    #[must_use]
    pub fn country_code(&self) -> &str {
        &self.country_code
    }

    /// Currency used when printing amounts.
    #[must_use]
    pub const fn currency(&self) -> CurrencyCode {
        self.currency
    }
}

impl Default for HandoffChannel {
    fn default() -> Self {
        Self {
            host: Self::DEFAULT_HOST.to_owned(),
            country_code: Self::DEFAULT_COUNTRY_CODE.to_owned(),
            signature: Self::DEFAULT_SIGNATURE.to_owned(),
            currency: CurrencyCode::default(),
        }
    }
}

/// One `product - quantity - subtotal` entry of an order message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Product name as shown in the cart.
    pub product_name: String,
    /// Units ordered.
    pub quantity: Quantity,
    /// `quantity × unit price`, rounded to two decimals.
    pub subtotal: Money,
}

impl OrderLine {
    /// Render as `- <name> - Qtd: <n> - <symbol> <subtotal>`.
    #[must_use]
    pub fn render(&self, currency: CurrencyCode) -> String {
        format!(
            "{LINE_PREFIX}{}{QUANTITY_SEPARATOR}{}{}{}",
            self.product_name,
            self.quantity,
            subtotal_separator(currency),
            self.subtotal.format_amount(),
        )
    }

    /// Parse a line produced by [`OrderLine::render`].
    ///
    /// # Errors
    ///
    /// Returns an error if the line does not have the rendered shape.
    pub fn parse(line: &str, currency: CurrencyCode) -> Result<Self, OrderLineParseError> {
        let body = line
            .strip_prefix(LINE_PREFIX)
            .ok_or_else(|| OrderLineParseError::Malformed(line.to_owned()))?;
        let (head, subtotal) = body
            .rsplit_once(&subtotal_separator(currency))
            .ok_or_else(|| OrderLineParseError::Malformed(line.to_owned()))?;
        let (product_name, quantity) = head
            .rsplit_once(QUANTITY_SEPARATOR)
            .ok_or_else(|| OrderLineParseError::Malformed(line.to_owned()))?;

        let quantity = quantity
            .parse::<i64>()
            .ok()
            .and_then(|q| Quantity::try_from_i64(q).ok())
            .ok_or_else(|| OrderLineParseError::Quantity(quantity.to_owned()))?;
        let subtotal = subtotal
            .parse::<Decimal>()
            .map_err(|_| OrderLineParseError::Amount(subtotal.to_owned()))?;

        Ok(Self {
            product_name: product_name.to_owned(),
            quantity,
            subtotal: Money::new(subtotal),
        })
    }

    /// Parse every item line out of a full order message.
    ///
    /// # Errors
    ///
    /// Returns the first item line that fails to parse.
    pub fn parse_all(message: &str, currency: CurrencyCode) -> Result<Vec<Self>, OrderLineParseError> {
        message
            .lines()
            .filter(|line| line.starts_with(LINE_PREFIX))
            .map(|line| Self::parse(line, currency))
            .collect()
    }
}

impl From<&LineItem> for OrderLine {
    fn from(item: &LineItem) -> Self {
        Self {
            product_name: single_line(&item.product_name),
            quantity: item.quantity,
            subtotal: Money::new(item.subtotal().rounded()),
        }
    }
}

/// Errors parsing an [`OrderLine`] back out of a message.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderLineParseError {
    /// The line does not have the `- name - Qtd: n - $ x` shape.
    #[error("malformed order line: {0:?}")]
    Malformed(String),
    /// The quantity is not a positive integer.
    #[error("invalid quantity in order line: {0:?}")]
    Quantity(String),
    /// The subtotal is not a decimal number.
    #[error("invalid amount in order line: {0:?}")]
    Amount(String),
}

/// The ephemeral summary built at checkout time.
///
/// Construction enforces the checkout preconditions, so holding an
/// `OrderDraft` means a link can be produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    customer_name: String,
    contact_handle: String,
    phone: PhoneNumber,
    lines: Vec<OrderLine>,
    total: Money,
}

impl OrderDraft {
    /// Assemble a draft from the cart view model and the total computed from it.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::MissingCustomerName`],
    /// [`CheckoutError::MissingContactHandle`] or
    /// [`CheckoutError::InvalidPhoneNumber`] when a contact field is blank or
    /// malformed.
    pub fn compose(
        customer_name: &str,
        contact_handle: &str,
        phone: &str,
        cart: &Cart,
        total: Money,
    ) -> Result<Self, CheckoutError> {
        let customer_name = single_line(customer_name.trim());
        if customer_name.is_empty() {
            return Err(CheckoutError::MissingCustomerName);
        }

        let contact_handle = single_line(contact_handle.trim());
        if contact_handle.is_empty() {
            return Err(CheckoutError::MissingContactHandle);
        }

        let phone = PhoneNumber::parse(phone)?;

        Ok(Self {
            customer_name,
            contact_handle,
            phone,
            lines: cart.items().iter().map(OrderLine::from).collect(),
            total,
        })
    }

    /// Customer name as entered.
    #[must_use]
    pub fn customer_name(&self) -> &str {
        &self.customer_name
    }

    /// Contact handle of the signed-in user.
    #[must_use]
    pub fn contact_handle(&self) -> &str {
        &self.contact_handle
    }

    /// Phone number the link is addressed to.
    #[must_use]
    pub const fn phone(&self) -> &PhoneNumber {
        &self.phone
    }

    /// Item lines in cart order.
    #[must_use]
    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    /// Total carried over from the total calculator.
    #[must_use]
    pub const fn total(&self) -> Money {
        self.total
    }

    /// The unescaped message text.
    #[must_use]
    pub fn message(&self, channel: &HandoffChannel) -> String {
        let currency = channel.currency;
        let mut out = Vec::with_capacity(self.lines.len() + 6);
        out.push(format!("{CUSTOMER_LABEL}{}", self.customer_name));
        out.push(format!("{CONTACT_LABEL}{}", self.contact_handle));
        out.push(PRODUCTS_LABEL.to_owned());
        out.extend(self.lines.iter().map(|line| line.render(currency)));
        out.push(format!("{TOTAL_LABEL}{}", self.total.display(currency)));
        out.push(FOOTER_RULE.to_owned());
        out.push(channel.signature.clone());
        out.join("\n")
    }

    /// The deep link carrying the percent-encoded message.
    #[must_use]
    pub fn link(&self, channel: &HandoffChannel) -> OrderLink {
        let message = self.message(channel);
        OrderLink(format!(
            "https://{}/{}{}?text={}",
            channel.host,
            channel.country_code,
            self.phone,
            utf8_percent_encode(&message, MESSAGE_ESCAPE_SET),
        ))
    }
}

/// A ready-to-open messaging deep link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderLink(String);

impl OrderLink {
    /// The link as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the link and returns the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for OrderLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for OrderLink {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn subtotal_separator(currency: CurrencyCode) -> String {
    format!(" - {} ", currency.symbol())
}

/// Collapse line breaks so free text cannot forge extra message lines.
fn single_line(s: &str) -> String {
    s.replace(['\r', '\n'], " ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::types::{LineItemId, ProductId, UserId};

    fn item(name: &str, quantity: u32, price: Decimal) -> LineItem {
        LineItem {
            id: LineItemId::random(),
            product_id: ProductId::random(),
            product_name: name.to_owned(),
            unit_price: Money::new(price),
            quantity: Quantity::new(quantity).unwrap(),
        }
    }

    fn widget_gadget_cart() -> Cart {
        Cart::from_items(
            UserId::random(),
            vec![item("Widget", 2, dec!(19.90)), item("Gadget", 1, dec!(5.00))],
        )
    }

    fn draft(cart: &Cart) -> OrderDraft {
        OrderDraft::compose("Maria", "maria@example.com", "81999999999", cart, cart.total()).unwrap()
    }

    #[test]
    fn test_message_layout() {
        let cart = widget_gadget_cart();
        let message = draft(&cart).message(&HandoffChannel::default());
        assert_eq!(
            message,
            "👤 Cliente: Maria\n\
             📧 Email: maria@example.com\n\
             📦 PRODUTOS:\n\
             - Widget - Qtd: 2 - R$ 39.80\n\
             - Gadget - Qtd: 1 - R$ 5.00\n\
             💰 TOTAL: R$ 44.80\n\
             ---\n\
             Pedido via STG Catalog"
        );
    }

    #[test]
    fn test_total_line_uses_given_total() {
        let cart = widget_gadget_cart();
        let draft =
            OrderDraft::compose("Maria", "m@x.io", "81999999999", &cart, Money::from_minor(100)).unwrap();
        assert!(draft.message(&HandoffChannel::default()).contains("💰 TOTAL: R$ 1.00"));
    }

    #[test]
    fn test_link_shape_and_escaping() {
        let cart = widget_gadget_cart();
        let link = draft(&cart).link(&HandoffChannel::default());
        let s = link.as_str();

        assert!(s.starts_with("https://wa.me/5581999999999?text="));
        let query = s.split_once("?text=").unwrap().1;
        assert!(!query.contains(' '));
        assert!(!query.contains('\n'));
        assert!(query.contains("%0A"));
        assert!(query.starts_with("%F0%9F%91%A4%20Cliente%3A%20Maria%0A"));

        let decoded = percent_encoding::percent_decode_str(query)
            .decode_utf8()
            .unwrap();
        assert_eq!(decoded, draft(&cart).message(&HandoffChannel::default()));
    }

    #[test]
    fn test_escaping_leaves_unreserved_marks() {
        let cart = Cart::from_items(
            UserId::random(),
            vec![item("Camiseta (M)!", 1, dec!(49.90))],
        );
        let draft =
            OrderDraft::compose("Ana O'Neil", "ana@example.com", "81999999999", &cart, cart.total())
                .unwrap();
        let link = draft.link(&HandoffChannel::default());
        let query = link.as_str().split_once("?text=").unwrap().1;

        assert!(query.contains("Ana%20O'Neil%0A"));
        assert!(query.contains("-%20Camiseta%20(M)!%20-%20Qtd%3A%201%20-%20R%24%2049.90"));
        assert!(query.contains("%F0%9F%93%A7%20Email%3A%20ana%40example.com"));

        let marks = OrderDraft::compose("a-b_c.d~e*f", "x@y.z", "81999999999", &cart, cart.total())
            .unwrap()
            .link(&HandoffChannel::default());
        assert!(marks.as_str().contains("Cliente%3A%20a-b_c.d~e*f%0A"));
    }

    #[test]
    fn test_link_is_deterministic() {
        let cart = widget_gadget_cart();
        let channel = HandoffChannel::default();
        assert_eq!(draft(&cart).link(&channel), draft(&cart).link(&channel));
    }

    #[test]
    fn test_round_trip_lines() {
        let channel = HandoffChannel::default();
        let carts = [
            Cart::new(UserId::random()),
            Cart::from_items(UserId::random(), vec![item("Solo", 1, dec!(3.333))]),
            Cart::from_items(
                UserId::random(),
                vec![
                    item("Widget", 2, dec!(19.90)),
                    item("Caneca - Azul", 12, dec!(7.25)),
                    item("Qtd: tricky", 3, dec!(0.99)),
                ],
            ),
        ];

        for cart in &carts {
            let message = draft(cart).message(&channel);
            let parsed = OrderLine::parse_all(&message, channel.currency()).unwrap();
            let expected: Vec<_> = cart.items().iter().map(OrderLine::from).collect();
            assert_eq!(parsed, expected);
        }
    }

    #[test]
    fn test_requires_customer_name() {
        let cart = widget_gadget_cart();
        let err = OrderDraft::compose("  ", "m@x.io", "81999999999", &cart, cart.total()).unwrap_err();
        assert_eq!(err, CheckoutError::MissingCustomerName);
    }

    #[test]
    fn test_requires_contact_handle() {
        let cart = widget_gadget_cart();
        let err = OrderDraft::compose("Maria", "", "81999999999", &cart, cart.total()).unwrap_err();
        assert_eq!(err, CheckoutError::MissingContactHandle);
    }

    #[test]
    fn test_requires_phone() {
        let cart = widget_gadget_cart();
        let err = OrderDraft::compose("Maria", "m@x.io", "", &cart, cart.total()).unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidPhoneNumber(_)));
    }

    #[test]
    fn test_newlines_in_free_text_are_flattened() {
        let cart = widget_gadget_cart();
        let draft =
            OrderDraft::compose("Maria\n- Fake - Qtd: 9 - R$ 0.00", "m@x.io", "81999999999", &cart, cart.total())
                .unwrap();
        let message = draft.message(&HandoffChannel::default());
        let parsed = OrderLine::parse_all(&message, CurrencyCode::BRL).unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn test_channel_validation() {
        assert!(HandoffChannel::new("wa.me", "55", "x", CurrencyCode::BRL).is_ok());
        assert!(matches!(
            HandoffChannel::new("wa.me/evil", "55", "x", CurrencyCode::BRL),
            Err(HandoffConfigError::InvalidHost(_))
        ));
        assert!(matches!(
            HandoffChannel::new("wa.me", "+55", "x", CurrencyCode::BRL),
            Err(HandoffConfigError::InvalidCountryCode(_))
        ));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            OrderLine::parse("Widget 2 39.80", CurrencyCode::BRL),
            Err(OrderLineParseError::Malformed(_))
        ));
        assert!(matches!(
            OrderLine::parse("- Widget - Qtd: 0 - R$ 1.00", CurrencyCode::BRL),
            Err(OrderLineParseError::Quantity(_))
        ));
    }
}
