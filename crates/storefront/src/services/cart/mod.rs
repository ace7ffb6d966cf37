//! Cart service.
//!
//! Owns one cart session per signed-in user: the view model, the checkout
//! state and the set of products with an add in flight. Every mutation runs
//! its full store round trip while holding the session lock, so writes for one
//! user are applied one after another and the view model only ever reflects
//! values the store has confirmed.
//!
//! # Modules
//!
//! - [`store`] - the line item store port and its error type
//! - `reconciler` - add / set quantity / remove
//! - `checkout` - checkout transitions and the order handoff
//! - [`memory`] - in-memory store (tests and the `test-support` feature)

mod checkout;
mod error;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
mod reconciler;
pub mod store;

pub use error::CartError;
pub use reconciler::{AddOutcome, LineOutcome, LineWrite, plan_add, plan_set};
pub use store::{CartRow, LineItemStore, ProductSummary, StoreError, StoredLine};

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use moka::future::Cache;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use stg_catalog_core::{Cart, CheckoutState, HandoffChannel, ProductId, UserId};

use crate::models::CurrentIdentity;

// =============================================================================
// Settings
// =============================================================================

/// Tunables for [`CartService`].
#[derive(Debug, Clone)]
pub struct CartSettings {
    /// Bound on every individual store call.
    pub store_timeout: Duration,
    /// How long an untouched cart session stays in memory.
    pub session_idle: Duration,
    /// Where composed orders are handed off.
    pub channel: HandoffChannel,
}

impl Default for CartSettings {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(5),
            session_idle: Duration::from_secs(30 * 60),
            channel: HandoffChannel::default(),
        }
    }
}

// =============================================================================
// Session
// =============================================================================

/// Mutable half of a cart session, guarded by the session lock.
#[derive(Debug, Default)]
struct SessionState {
    /// `None` until the first fetch, or after a re-fetch failed.
    cart: Option<Cart>,
    checkout: CheckoutState,
}

/// One user's cart session.
#[derive(Debug, Default)]
struct CartSession {
    state: Mutex<SessionState>,
    /// Products with an add queued or running, with the number of such adds.
    in_flight: std::sync::Mutex<HashMap<ProductId, usize>>,
}

impl CartSession {
    fn mark_pending(&self, product: ProductId) -> PendingGuard<'_> {
        *self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(product)
            .or_insert(0) += 1;
        PendingGuard {
            session: self,
            product,
        }
    }

    fn pending(&self) -> Vec<ProductId> {
        let mut pending: Vec<_> = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        pending.sort_unstable();
        pending
    }
}

/// Clears an in-flight marker when the add finishes, however it finishes.
struct PendingGuard<'a> {
    session: &'a CartSession,
    product: ProductId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = self
            .session
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(count) = in_flight.get_mut(&self.product) {
            *count -= 1;
            if *count == 0 {
                in_flight.remove(&self.product);
            }
        }
    }
}

/// Read-only copy of a cart session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSnapshot {
    pub cart: Cart,
    pub checkout: CheckoutState,
    /// Products with an add that has not been confirmed yet.
    pub pending: Vec<ProductId>,
}

impl CartSnapshot {
    /// Whether the "place order" action should be offered.
    #[must_use]
    pub fn checkout_available(&self) -> bool {
        CheckoutState::can_begin(&self.cart)
    }
}

// =============================================================================
// CartService
// =============================================================================

/// Cart reconciler, view model synchronizer and checkout driver.
pub struct CartService<S> {
    inner: Arc<CartServiceInner<S>>,
}

struct CartServiceInner<S> {
    store: S,
    sessions: Cache<UserId, Arc<CartSession>>,
    settings: CartSettings,
}

impl<S> Clone for CartService<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: LineItemStore> CartService<S> {
    /// Create a cart service over `store`.
    ///
    /// Sessions expire only by idleness, never by capacity: evicting a session
    /// whose lock is held would let the user's next request build a second
    /// session with its own lock and interleave with the first.
    #[must_use]
    pub fn new(store: S, settings: CartSettings) -> Self {
        let sessions = Cache::builder()
            .time_to_idle(settings.session_idle)
            .build();

        Self {
            inner: Arc::new(CartServiceInner {
                store,
                sessions,
                settings,
            }),
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    /// The configured handoff channel.
    #[must_use]
    pub fn channel(&self) -> &HandoffChannel {
        &self.inner.settings.channel
    }

    /// The user's cart, fetched from the store on first access.
    ///
    /// # Errors
    ///
    /// Returns `CartError::IdentityMissing` without a signed-in user and
    /// `CartError::Store` if the initial fetch fails.
    #[instrument(skip(self, identity))]
    pub async fn cart(
        &self,
        identity: Option<&CurrentIdentity>,
    ) -> Result<CartSnapshot, CartError> {
        let identity = require_identity(identity)?;
        let session = self.session(identity.user_id).await;
        let mut state = session.state.lock().await;

        let cart = self.load(identity.user_id, &mut state).await?.clone();
        Ok(CartSnapshot {
            cart,
            checkout: state.checkout.clone(),
            pending: session.pending(),
        })
    }

    /// Discard the view model and fetch the cart again.
    ///
    /// The checkout state is reset if the fetched lines differ from the ones
    /// held in memory.
    ///
    /// # Errors
    ///
    /// Same as [`CartService::cart`]. On a failed fetch the previous view
    /// model is kept.
    #[instrument(skip(self, identity))]
    pub async fn refresh(
        &self,
        identity: Option<&CurrentIdentity>,
    ) -> Result<CartSnapshot, CartError> {
        let identity = require_identity(identity)?;
        let session = self.session(identity.user_id).await;
        let mut state = session.state.lock().await;

        let fresh = self.fetch(identity.user_id).await?;
        state.checkout = state.checkout.after_write(state.cart.as_ref(), &fresh);
        state.cart = Some(fresh.clone());

        Ok(CartSnapshot {
            cart: fresh,
            checkout: state.checkout.clone(),
            pending: session.pending(),
        })
    }

    /// Drop the user's cart session (sign-out).
    pub async fn end_session(&self, user: UserId) {
        self.inner.sessions.invalidate(&user).await;
        debug!(user_id = %user, "Cart session ended");
    }

    // =========================================================================
    // Internals shared by the reconciler and checkout
    // =========================================================================

    async fn session(&self, user: UserId) -> Arc<CartSession> {
        self.inner
            .sessions
            .get_with(user, async { Arc::new(CartSession::default()) })
            .await
    }

    /// Run one store call under the configured timeout.
    async fn call<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        let limit = self.inner.settings.store_timeout;
        match tokio::time::timeout(limit, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!(operation, error = %e, "Store call failed");
                Err(e)
            }
            Err(_) => {
                warn!(
                    operation,
                    timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                    "Store call timed out"
                );
                Err(StoreError::Timeout(limit))
            }
        }
    }

    /// One joined read of the user's cart, dropping lines whose product is gone.
    async fn fetch(&self, user: UserId) -> Result<Cart, StoreError> {
        let rows = self
            .call("list_cart", self.inner.store.list_cart(user))
            .await?;

        let fetched = rows.len();
        let items: Vec<_> = rows.into_iter().filter_map(CartRow::into_line_item).collect();
        if items.len() < fetched {
            debug!(
                user_id = %user,
                dropped = fetched - items.len(),
                "Skipped cart lines whose product no longer exists"
            );
        }

        Ok(Cart::from_items(user, items))
    }

    /// The session's view model, fetching it if not loaded.
    async fn load<'a>(
        &self,
        user: UserId,
        state: &'a mut SessionState,
    ) -> Result<&'a mut Cart, StoreError> {
        let cart = match state.cart.take() {
            Some(cart) => cart,
            None => self.fetch(user).await?,
        };
        Ok(state.cart.insert(cart))
    }

    /// Re-fetch after a confirmed write.
    ///
    /// The write already happened, so a failed re-fetch is not reported to the
    /// caller; the view model is marked unloaded and fetched on next access.
    async fn resync(&self, user: UserId, state: &mut SessionState) {
        match self.fetch(user).await {
            Ok(cart) => state.cart = Some(cart),
            Err(e) => {
                warn!(user_id = %user, error = %e, "Cart re-fetch failed after confirmed write");
                state.cart = None;
            }
        }
    }

    /// Recompute the checkout state after a confirmed write.
    ///
    /// `previous` is the view model as it was before the write.
    fn settle_checkout(state: &mut SessionState, previous: Option<&Cart>) {
        state.checkout = match &state.cart {
            Some(cart) => state.checkout.after_write(previous, cart),
            None => CheckoutState::Browsing,
        };
    }
}

/// The signed-in identity, or `IdentityMissing`.
fn require_identity(identity: Option<&CurrentIdentity>) -> Result<&CurrentIdentity, CartError> {
    identity.ok_or(CartError::IdentityMissing)
}
