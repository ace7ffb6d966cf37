//! Integration tests for STG Catalog.
//!
//! # Running Tests
//!
//! ```bash
//! # HTTP and service tests (in-memory store, no database needed)
//! cargo test -p stg-catalog-integration-tests
//!
//! # Postgres-backed tests
//! STOREFRONT_DATABASE_URL=postgres://... cargo test -p stg-catalog-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `cart_flow` - Cart reconciliation over HTTP
//! - `order_handoff` - Checkout and deep link composition
//! - `postgres_store` - The `PostgreSQL` line item store

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Response};
use rust_decimal_macros::dec;
use secrecy::SecretString;
use serde_json::Value;
use tower_sessions::{MemoryStore, SessionManagerLayer};

use stg_catalog_core::{Money, ProductId, UserId};
use stg_catalog_storefront::services::identity::{SIGNATURE_HEADER, TIMESTAMP_HEADER, unix_now};
use stg_catalog_storefront::services::{CartSettings, IdentityVerifier};
use stg_catalog_storefront::services::cart::ProductSummary;
use stg_catalog_storefront::services::cart::memory::MemoryLineItemStore;
use stg_catalog_storefront::state::AppState;

/// Phone number used by the checkout tests.
pub const TEST_PHONE: &str = "81999999999";

/// Secret the test server shares with its stand-in identity backend.
pub const TEST_IDENTITY_SECRET: &str = "k7#Qm2!vX9@pL4$wR8^tN1&zB6*cF3%h";

/// A storefront running on an ephemeral port over the in-memory store.
pub struct TestContext {
    pub base_url: String,
    pub store: Arc<MemoryLineItemStore>,
    pub state: AppState<Arc<MemoryLineItemStore>>,
    /// Signs sign-in requests the way the identity backend does.
    pub identity: IdentityVerifier,
}

impl TestContext {
    /// Start a server with default cart settings and a short store timeout.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn new() -> Self {
        Self::with_settings(CartSettings {
            store_timeout: Duration::from_millis(500),
            ..CartSettings::default()
        })
        .await
    }

    /// Start a server with the given cart settings.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn with_settings(settings: CartSettings) -> Self {
        let store = Arc::new(MemoryLineItemStore::new());
        let identity = IdentityVerifier::new(SecretString::from(TEST_IDENTITY_SECRET));
        let state = AppState::with_store(Arc::clone(&store), settings, identity.clone());

        // Plain HTTP in tests, so the cookie must not be marked Secure
        let sessions = SessionManagerLayer::new(MemoryStore::default()).with_secure(false);
        let app = stg_catalog_storefront::app(state.clone()).layer(sessions);

        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local address");

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Test server error");
        });

        Self {
            base_url: format!("http://{addr}"),
            store,
            state,
            identity,
        }
    }

    /// Build an absolute URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Add a product to the catalog and return its ID.
    #[must_use]
    pub fn product(&self, name: &str, price: Money) -> ProductId {
        let id = ProductId::random();
        self.store.add_product(ProductSummary {
            id,
            name: name.to_string(),
            price,
        });
        id
    }

    /// Two catalog products: "Widget" at 19.90 and "Gadget" at 5.00.
    #[must_use]
    pub fn widget_and_gadget(&self) -> (ProductId, ProductId) {
        (
            self.product("Widget", Money::new(dec!(19.90))),
            self.product("Gadget", Money::new(dec!(5.00))),
        )
    }

    /// A client with no session.
    ///
    /// # Panics
    ///
    /// Panics if the client cannot be built.
    #[must_use]
    pub fn anonymous_client() -> Client {
        Client::builder()
            .cookie_store(true)
            .build()
            .expect("Failed to create HTTP client")
    }

    /// Post a sign-in for `body`, signed at the current time.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn sign_in(&self, client: &Client, body: &Value) -> Response {
        let body = serde_json::to_vec(body).expect("Failed to encode sign-in body");
        let timestamp = unix_now();
        let signature = self
            .identity
            .sign(timestamp, &body)
            .expect("Failed to sign sign-in body");

        client
            .post(self.url("/session"))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(TIMESTAMP_HEADER, timestamp.to_string())
            .header(SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .await
            .expect("Failed to sign in")
    }

    /// A client signed in as `user`.
    ///
    /// # Panics
    ///
    /// Panics if the sign-in request fails.
    pub async fn signed_in_client(&self, user: UserId) -> Client {
        let client = Self::anonymous_client();
        let resp = self
            .sign_in(
                &client,
                &serde_json::json!({
                    "user_id": user,
                    "contact": "ana@example.com",
                }),
            )
            .await;
        assert!(resp.status().is_success(), "sign-in failed: {}", resp.status());
        client
    }

    /// A fresh user ID.
    #[must_use]
    pub fn user() -> UserId {
        UserId::random()
    }
}
