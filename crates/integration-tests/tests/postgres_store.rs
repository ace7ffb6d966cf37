//! Integration tests for the `PostgreSQL` line item store.
//!
//! These tests require:
//! - A running `PostgreSQL` database
//! - `STOREFRONT_DATABASE_URL` (or `DATABASE_URL`) pointing at it
//!
//! Run with: cargo test -p stg-catalog-integration-tests -- --ignored

#![allow(clippy::unwrap_used)]

use rust_decimal_macros::dec;
use secrecy::SecretString;
use sqlx::PgPool;
use uuid::Uuid;

use stg_catalog_core::{Money, ProductId, UserId};
use stg_catalog_storefront::db::{self, CartItemRepository, NewProduct, ProductRepository};
use stg_catalog_storefront::models::CurrentIdentity;
use stg_catalog_storefront::services::cart::{LineItemStore, StoreError};
use stg_catalog_storefront::services::{CartService, CartSettings};

async fn pool() -> PgPool {
    let url = std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .expect("STOREFRONT_DATABASE_URL not set");
    let pool = db::create_pool(&SecretString::from(url))
        .await
        .expect("Failed to connect to database");
    sqlx::migrate!("../storefront/migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

/// Insert a uniquely named product.
async fn product(pool: &PgPool, price: Money) -> ProductId {
    let repo = ProductRepository::new(pool);
    repo.upsert(&NewProduct {
        name: format!("Test product {}", Uuid::new_v4()),
        description: None,
        price,
        image_url: None,
        category: Some("test".to_string()),
    })
    .await
    .expect("Failed to insert product")
    .id
}

fn identity() -> CurrentIdentity {
    CurrentIdentity::new(UserId::random(), "test@example.com")
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database"]
async fn test_merge_on_add_keeps_one_row() {
    let pool = pool().await;
    let widget = product(&pool, Money::new(dec!(19.90))).await;
    let service = CartService::new(CartItemRepository::new(pool.clone()), CartSettings::default());
    let who = identity();

    let (a, b) = tokio::join!(
        service.add_to_cart(Some(&who), widget),
        service.add_to_cart(Some(&who), widget)
    );
    a.unwrap();
    b.unwrap();
    let last = service.add_to_cart(Some(&who), widget).await.unwrap();
    assert_eq!(last.quantity.get(), 3);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cart_items WHERE user_id = $1")
        .bind(who.user_id.as_uuid())
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 1);

    let snapshot = service.cart(Some(&who)).await.unwrap();
    assert_eq!(snapshot.cart.total().format_amount(), "59.70");
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database"]
async fn test_duplicate_insert_is_a_conflict() {
    let pool = pool().await;
    let widget = product(&pool, Money::new(dec!(1.00))).await;
    let repo = CartItemRepository::new(pool);
    let user = UserId::random();
    let one = stg_catalog_core::Quantity::ONE;

    repo.insert_line(user, widget, one).await.unwrap();
    let err = repo.insert_line(user, widget, one).await.unwrap_err();
    assert_eq!(err, StoreError::Conflict);

    let err = repo
        .insert_line(user, ProductId::random(), one)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownProduct(_)));
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database"]
async fn test_deleted_product_drops_out_of_cart() {
    let pool = pool().await;
    let widget = product(&pool, Money::new(dec!(19.90))).await;
    let gadget = product(&pool, Money::new(dec!(5.00))).await;
    let service = CartService::new(CartItemRepository::new(pool.clone()), CartSettings::default());
    let who = identity();

    service.add_to_cart(Some(&who), widget).await.unwrap();
    service.add_to_cart(Some(&who), gadget).await.unwrap();

    sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(widget.as_uuid())
        .execute(&pool)
        .await
        .unwrap();

    let snapshot = service.refresh(Some(&who)).await.unwrap();
    assert_eq!(snapshot.cart.len(), 1);
    assert_eq!(snapshot.cart.total().format_amount(), "5.00");
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database"]
async fn test_writes_are_scoped_to_owner() {
    let pool = pool().await;
    let widget = product(&pool, Money::new(dec!(2.50))).await;
    let repo = CartItemRepository::new(pool);
    let owner = UserId::random();
    let stranger = UserId::random();

    let line = repo
        .insert_line(owner, widget, stg_catalog_core::Quantity::ONE)
        .await
        .unwrap();

    let two = stg_catalog_core::Quantity::new(2).unwrap();
    assert!(repo.update_quantity(stranger, line.id, two).await.unwrap().is_none());
    assert!(repo.increment_line(stranger, line.id).await.unwrap().is_none());
    assert!(!repo.delete_line(stranger, line.id).await.unwrap());

    let found = repo.find_line(owner, widget).await.unwrap().unwrap();
    assert_eq!(found.quantity.get(), 1);
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database"]
async fn test_merges_from_two_instances_all_count() {
    let pool = pool().await;
    let widget = product(&pool, Money::new(dec!(19.90))).await;
    // Two storefront processes: same database, separate cart sessions
    let first = CartService::new(CartItemRepository::new(pool.clone()), CartSettings::default());
    let second = CartService::new(CartItemRepository::new(pool.clone()), CartSettings::default());
    let who = identity();

    first.add_to_cart(Some(&who), widget).await.unwrap();
    for _ in 0..5 {
        let (a, b) = tokio::join!(
            first.add_to_cart(Some(&who), widget),
            second.add_to_cart(Some(&who), widget)
        );
        a.unwrap();
        b.unwrap();
    }

    let quantity: i32 =
        sqlx::query_scalar("SELECT quantity FROM cart_items WHERE user_id = $1")
            .bind(who.user_id.as_uuid())
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(quantity, 11);
}
