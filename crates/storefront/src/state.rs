//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::db::CartItemRepository;
use crate::services::cart::LineItemStore;
use crate::services::{CartService, CartSettings, IdentityVerifier};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. It is generic over the line
/// item store so the router can run against the in-memory store in tests.
pub struct AppState<S = CartItemRepository> {
    inner: Arc<AppStateInner<S>>,
}

struct AppStateInner<S> {
    cart: CartService<S>,
    /// Checks signatures on sign-in handoffs.
    identity: IdentityVerifier,
    /// Checked by the readiness endpoint when the store is database-backed.
    pool: Option<PgPool>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl AppState {
    /// Create the production state over a `PostgreSQL` pool.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `pool` - `PostgreSQL` connection pool
    #[must_use]
    pub fn new(config: &StorefrontConfig, pool: PgPool) -> Self {
        let store = CartItemRepository::new(pool.clone());
        Self {
            inner: Arc::new(AppStateInner {
                cart: CartService::new(store, config.cart_settings()),
                identity: config.identity_verifier(),
                pool: Some(pool),
            }),
        }
    }
}

impl<S: LineItemStore> AppState<S> {
    /// Create a state over any line item store, without a database pool.
    #[must_use]
    pub fn with_store(store: S, settings: CartSettings, identity: IdentityVerifier) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                cart: CartService::new(store, settings),
                identity,
                pool: None,
            }),
        }
    }

    /// Get a reference to the cart service.
    #[must_use]
    pub fn cart(&self) -> &CartService<S> {
        &self.inner.cart
    }

    /// Get a reference to the sign-in signature verifier.
    #[must_use]
    pub fn identity(&self) -> &IdentityVerifier {
        &self.inner.identity
    }

    /// Get a reference to the database connection pool, if any.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }
}
