//! Product repository.
//!
//! The catalog itself is owned by the backend; the storefront only writes to
//! `products` when seeding it from the CLI.

use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use stg_catalog_core::{Money, ProductId};

use super::RepositoryError;

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub image_url: Option<String>,
    pub category: Option<String>,
}

/// Product fields as read from a seed file.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Money,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// Internal row type for `products` queries.
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    price: rust_decimal::Decimal,
    image_url: Option<String>,
    category: Option<String>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            name: row.name,
            description: row.description,
            price: Money::new(row.price),
            image_url: row.image_url,
            category: row.category,
        }
    }
}

/// Repository for catalog products.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a product, or update the one with the same name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::InvalidInput` for a negative price and
    /// `RepositoryError::Database` if the query fails.
    pub async fn upsert(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        if product.price.amount().is_sign_negative() {
            return Err(RepositoryError::InvalidInput(format!(
                "negative price for {}",
                product.name
            )));
        }

        let row = sqlx::query_as::<_, ProductRow>(
            r"
            INSERT INTO products (name, description, price, image_url, category)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (name) DO UPDATE
            SET description = EXCLUDED.description,
                price = EXCLUDED.price,
                image_url = EXCLUDED.image_url,
                category = EXCLUDED.category
            RETURNING id, name, description, price, image_url, category
            ",
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.amount())
        .bind(&product.image_url)
        .bind(&product.category)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }
}
