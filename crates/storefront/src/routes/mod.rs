//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health               - Liveness check
//! GET    /health/ready         - Readiness check (database ping)
//!
//! # Session
//! POST   /session              - Record the signed-in identity (signed)
//! DELETE /session              - Sign out
//!
//! # Cart (requires identity)
//! GET    /cart                 - Cart view with total
//! POST   /cart/add             - Add one unit (returns acknowledgment)
//! POST   /cart/update          - Set quantity, zero removes (returns cart)
//! POST   /cart/remove          - Remove line (returns cart)
//! GET    /cart/count           - Cart count badge
//!
//! # Checkout (requires identity)
//! POST   /checkout/start       - Open the order form
//! POST   /checkout/cancel      - Close the order form
//! GET    /checkout/form        - Whether the form can be submitted
//! POST   /checkout             - Place the order (returns deep link)
//! ```

pub mod cart;
pub mod checkout;
pub mod health;
pub mod session;

use axum::{
    Router,
    routing::{get, post},
};

use crate::services::cart::LineItemStore;
use crate::state::AppState;

/// Create the session routes router.
pub fn session_routes<S: LineItemStore>() -> Router<AppState<S>> {
    Router::new().route("/", post(session::sign_in::<S>).delete(session::sign_out::<S>))
}

/// Create the cart routes router.
pub fn cart_routes<S: LineItemStore>() -> Router<AppState<S>> {
    Router::new()
        .route("/", get(cart::show::<S>))
        .route("/add", post(cart::add::<S>))
        .route("/update", post(cart::update::<S>))
        .route("/remove", post(cart::remove::<S>))
        .route("/count", get(cart::count::<S>))
}

/// Create the checkout routes router.
pub fn checkout_routes<S: LineItemStore>() -> Router<AppState<S>> {
    Router::new()
        .route("/", post(checkout::place_order::<S>))
        .route("/start", post(checkout::start::<S>))
        .route("/cancel", post(checkout::cancel::<S>))
        .route("/form", get(checkout::form_status::<S>))
}

/// Create all routes for the storefront.
pub fn routes<S: LineItemStore>() -> Router<AppState<S>> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness::<S>))
        // Identity
        .nest("/session", session_routes())
        // Cart routes
        .nest("/cart", cart_routes())
        // Order handoff
        .nest("/checkout", checkout_routes())
}
