//! Cart view model and total calculator.
//!
//! [`Cart`] is the in-memory materialization of one user's cart. It is only
//! ever changed to mirror a write the store has already confirmed; the
//! reconciliation round trips live in the `storefront` crate.

use serde::{Deserialize, Serialize};

use crate::types::{LineItemId, Money, ProductId, Quantity, UserId};

/// One product's quantity in a cart, with the product's name and unit price
/// denormalized from the catalog at fetch time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Store-assigned identity of the row.
    pub id: LineItemId,
    /// Product this line refers to.
    pub product_id: ProductId,
    /// Product name shown to the customer.
    pub product_name: String,
    /// Price of a single unit.
    pub unit_price: Money,
    /// Number of units, always at least one.
    pub quantity: Quantity,
}

impl LineItem {
    /// `quantity × unit_price`, exact.
    #[must_use]
    pub fn subtotal(&self) -> Money {
        self.unit_price * self.quantity
    }
}

/// Sum of `quantity × unit_price` over `items`.
///
/// Exact decimal arithmetic, so the result does not depend on item order.
#[must_use]
pub fn total(items: &[LineItem]) -> Money {
    items.iter().map(LineItem::subtotal).sum()
}

/// A user's cart as an ordered sequence of line items.
///
/// The order is the store's fetch order and stays stable for the lifetime of
/// the view model: quantity changes update lines in place, removals close the
/// gap, and new lines only appear through [`Cart::replace_items`] after a
/// re-fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    owner: UserId,
    items: Vec<LineItem>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn new(owner: UserId) -> Self {
        Self {
            owner,
            items: Vec::new(),
        }
    }

    /// A cart populated from a store fetch, keeping fetch order.
    #[must_use]
    pub const fn from_items(owner: UserId, items: Vec<LineItem>) -> Self {
        Self { owner, items }
    }

    /// The user who owns this cart.
    #[must_use]
    pub const fn owner(&self) -> UserId {
        self.owner
    }

    /// Line items in fetch order.
    #[must_use]
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Total number of units across all lines (the cart badge count).
    #[must_use]
    pub fn unit_count(&self) -> u64 {
        self.items
            .iter()
            .map(|item| u64::from(item.quantity.get()))
            .sum()
    }

    /// Monetary total, recomputed on every call.
    #[must_use]
    pub fn total(&self) -> Money {
        total(&self.items)
    }

    /// Look up a line by its store identity.
    #[must_use]
    pub fn line(&self, id: LineItemId) -> Option<&LineItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Look up the line for a product.
    #[must_use]
    pub fn line_for_product(&self, product_id: ProductId) -> Option<&LineItem> {
        self.items.iter().find(|item| item.product_id == product_id)
    }

    /// Overwrite a line's quantity with a confirmed value.
    ///
    /// Returns `false` if the line is not in the view model.
    pub fn set_quantity(&mut self, id: LineItemId, quantity: Quantity) -> bool {
        match self.items.iter_mut().find(|item| item.id == id) {
            Some(item) => {
                item.quantity = quantity;
                true
            }
            None => false,
        }
    }

    /// Drop a line, returning it if it was present.
    pub fn remove(&mut self, id: LineItemId) -> Option<LineItem> {
        let position = self.items.iter().position(|item| item.id == id)?;
        Some(self.items.remove(position))
    }

    /// Replace every line with a fresh fetch from the store.
    pub fn replace_items(&mut self, items: Vec<LineItem>) {
        self.items = items;
    }
}
