//! Cart item repository.
//!
//! Postgres implementation of [`LineItemStore`] over `cart_items`, joined with
//! `products` for the cart read. Each call is a single statement; the unique
//! index on `(user_id, product_id)` is what keeps one line per product.

use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use stg_catalog_core::{LineItemId, Money, ProductId, Quantity, UserId};

use crate::services::cart::{CartRow, LineItemStore, ProductSummary, StoreError, StoredLine};

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for `cart_items` queries.
#[derive(Debug, sqlx::FromRow)]
struct CartItemRow {
    id: Uuid,
    user_id: Uuid,
    product_id: Option<Uuid>,
    quantity: i32,
}

impl TryFrom<CartItemRow> for StoredLine {
    type Error = StoreError;

    fn try_from(row: CartItemRow) -> Result<Self, Self::Error> {
        let product_id = row
            .product_id
            .ok_or_else(|| StoreError::Corrupt(format!("cart item {} has no product", row.id)))?;

        Ok(Self {
            id: LineItemId::new(row.id),
            user_id: UserId::new(row.user_id),
            product_id: ProductId::new(product_id),
            quantity: stored_quantity(row.id, row.quantity)?,
        })
    }
}

/// Internal row type for the joined cart read.
#[derive(Debug, sqlx::FromRow)]
struct CartJoinRow {
    id: Uuid,
    quantity: i32,
    product_id: Option<Uuid>,
    product_name: Option<String>,
    product_price: Option<rust_decimal::Decimal>,
}

impl TryFrom<CartJoinRow> for CartRow {
    type Error = StoreError;

    fn try_from(row: CartJoinRow) -> Result<Self, Self::Error> {
        let product = match (row.product_id, row.product_name, row.product_price) {
            (Some(id), Some(name), Some(price)) => Some(ProductSummary {
                id: ProductId::new(id),
                name,
                price: Money::new(price),
            }),
            _ => None,
        };

        Ok(Self {
            id: LineItemId::new(row.id),
            quantity: stored_quantity(row.id, row.quantity)?,
            product,
        })
    }
}

fn stored_quantity(id: Uuid, quantity: i32) -> Result<Quantity, StoreError> {
    Quantity::try_from_i64(i64::from(quantity))
        .map_err(|e| StoreError::Corrupt(format!("cart item {id}: {e}")))
}

/// Map a driver error onto the store's error vocabulary.
fn store_error(e: sqlx::Error, product: Option<ProductId>) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_unique_violation() {
            return StoreError::Conflict;
        }
        if db_err.is_foreign_key_violation()
            && let Some(product) = product
        {
            return StoreError::UnknownProduct(product);
        }
    }
    StoreError::Unavailable(e.to_string())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for cart line items.
#[derive(Clone)]
pub struct CartItemRepository {
    pool: PgPool,
}

impl CartItemRepository {
    /// Create a new cart item repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl LineItemStore for CartItemRepository {
    #[instrument(skip(self))]
    async fn find_line(
        &self,
        user: UserId,
        product: ProductId,
    ) -> Result<Option<StoredLine>, StoreError> {
        let row = sqlx::query_as::<_, CartItemRow>(
            r"
            SELECT id, user_id, product_id, quantity
            FROM cart_items
            WHERE user_id = $1 AND product_id = $2
            ",
        )
        .bind(user.as_uuid())
        .bind(product.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error(e, None))?;

        row.map(StoredLine::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn insert_line(
        &self,
        user: UserId,
        product: ProductId,
        quantity: Quantity,
    ) -> Result<StoredLine, StoreError> {
        let row = sqlx::query_as::<_, CartItemRow>(
            r"
            INSERT INTO cart_items (user_id, product_id, quantity)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, product_id, quantity
            ",
        )
        .bind(user.as_uuid())
        .bind(product.as_uuid())
        .bind(quantity.as_i32())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| store_error(e, Some(product)))?;

        row.try_into()
    }

    #[instrument(skip(self))]
    async fn update_quantity(
        &self,
        user: UserId,
        line: LineItemId,
        quantity: Quantity,
    ) -> Result<Option<StoredLine>, StoreError> {
        let row = sqlx::query_as::<_, CartItemRow>(
            r"
            UPDATE cart_items
            SET quantity = $3, updated_at = now()
            WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, product_id, quantity
            ",
        )
        .bind(line.as_uuid())
        .bind(user.as_uuid())
        .bind(quantity.as_i32())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error(e, None))?;

        row.map(StoredLine::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn increment_line(
        &self,
        user: UserId,
        line: LineItemId,
    ) -> Result<Option<StoredLine>, StoreError> {
        let row = sqlx::query_as::<_, CartItemRow>(
            r"
            UPDATE cart_items
            SET quantity = quantity + 1, updated_at = now()
            WHERE id = $1 AND user_id = $2 AND quantity < $3
            RETURNING id, user_id, product_id, quantity
            ",
        )
        .bind(line.as_uuid())
        .bind(user.as_uuid())
        .bind(i32::MAX)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error(e, None))?;

        row.map(StoredLine::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn delete_line(&self, user: UserId, line: LineItemId) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r"
            DELETE FROM cart_items
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(line.as_uuid())
        .bind(user.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| store_error(e, None))?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn list_cart(&self, user: UserId) -> Result<Vec<CartRow>, StoreError> {
        let rows = sqlx::query_as::<_, CartJoinRow>(
            r"
            SELECT ci.id,
                   ci.quantity,
                   p.id AS product_id,
                   p.name AS product_name,
                   p.price AS product_price
            FROM cart_items ci
            LEFT JOIN products p ON p.id = ci.product_id
            WHERE ci.user_id = $1
            ORDER BY ci.created_at, ci.id
            ",
        )
        .bind(user.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error(e, None))?;

        rows.into_iter().map(CartRow::try_from).collect()
    }
}
