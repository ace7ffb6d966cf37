//! Line item store port.
//!
//! The cart service only needs single-row operations from its backend; there
//! are no multi-row transactions to lean on. Every write is scoped to the
//! owning user so a line ID leaked from another session cannot be touched.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use stg_catalog_core::{LineItem, LineItemId, Money, ProductId, Quantity, UserId};

/// A `cart_items` row as confirmed by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredLine {
    pub id: LineItemId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: Quantity,
}

/// Product fields denormalized into the cart view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
}

/// One row of the joined `cart_items` ⨝ `products` read.
///
/// `product` is `None` when the referenced product no longer exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartRow {
    pub id: LineItemId,
    pub quantity: Quantity,
    pub product: Option<ProductSummary>,
}

impl CartRow {
    /// The view-model line for this row, if its product still resolves.
    #[must_use]
    pub fn into_line_item(self) -> Option<LineItem> {
        let product = self.product?;
        Some(LineItem {
            id: self.id,
            product_id: product.id,
            product_name: product.name,
            unit_price: product.price,
            quantity: self.quantity,
        })
    }
}

/// Failures of a single store call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The backend could not be reached or failed the call.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The call did not complete within the configured bound.
    #[error("store call timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// A row for the same `(user, product)` pair already exists.
    #[error("line item already exists for this product")]
    Conflict,

    /// The product referenced by an insert does not exist.
    #[error("unknown product: {0}")]
    UnknownProduct(ProductId),

    /// The backend returned a row that violates the line item invariants.
    #[error("corrupt cart row: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Whether re-issuing the same logical operation may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_) | Self::Conflict)
    }
}

/// Row-level access to the durable `(user, product) -> quantity` table.
///
/// Implementations must be thread-safe (`Send + Sync`). Updates and deletes
/// of rows that do not exist are not errors: they report `None` / `false`.
pub trait LineItemStore: Send + Sync + 'static {
    /// Point lookup of the line for `(user, product)`.
    fn find_line(
        &self,
        user: UserId,
        product: ProductId,
    ) -> impl Future<Output = Result<Option<StoredLine>, StoreError>> + Send;

    /// Create a line. Fails with [`StoreError::Conflict`] if one exists.
    fn insert_line(
        &self,
        user: UserId,
        product: ProductId,
        quantity: Quantity,
    ) -> impl Future<Output = Result<StoredLine, StoreError>> + Send;

    /// Set a line's quantity. Returns `None` if the user has no such line.
    fn update_quantity(
        &self,
        user: UserId,
        line: LineItemId,
        quantity: Quantity,
    ) -> impl Future<Output = Result<Option<StoredLine>, StoreError>> + Send;

    /// Add one unit to a line in a single atomic step.
    ///
    /// The increment is applied to whatever quantity the store holds, so
    /// concurrent increments from separate processes all count. Returns `None`
    /// if the user has no such line or it is already at [`Quantity::MAX`].
    fn increment_line(
        &self,
        user: UserId,
        line: LineItemId,
    ) -> impl Future<Output = Result<Option<StoredLine>, StoreError>> + Send;

    /// Delete a line. Returns whether a row was removed.
    fn delete_line(
        &self,
        user: UserId,
        line: LineItemId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// All of a user's lines joined with their products, in insertion order.
    fn list_cart(&self, user: UserId)
    -> impl Future<Output = Result<Vec<CartRow>, StoreError>> + Send;
}

impl<T: LineItemStore> LineItemStore for Arc<T> {
    fn find_line(
        &self,
        user: UserId,
        product: ProductId,
    ) -> impl Future<Output = Result<Option<StoredLine>, StoreError>> + Send {
        (**self).find_line(user, product)
    }

    fn insert_line(
        &self,
        user: UserId,
        product: ProductId,
        quantity: Quantity,
    ) -> impl Future<Output = Result<StoredLine, StoreError>> + Send {
        (**self).insert_line(user, product, quantity)
    }

    fn update_quantity(
        &self,
        user: UserId,
        line: LineItemId,
        quantity: Quantity,
    ) -> impl Future<Output = Result<Option<StoredLine>, StoreError>> + Send {
        (**self).update_quantity(user, line, quantity)
    }

    fn increment_line(
        &self,
        user: UserId,
        line: LineItemId,
    ) -> impl Future<Output = Result<Option<StoredLine>, StoreError>> + Send {
        (**self).increment_line(user, line)
    }

    fn delete_line(
        &self,
        user: UserId,
        line: LineItemId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send {
        (**self).delete_line(user, line)
    }

    fn list_cart(
        &self,
        user: UserId,
    ) -> impl Future<Output = Result<Vec<CartRow>, StoreError>> + Send {
        (**self).list_cart(user)
    }
}
