//! STG Catalog Storefront library.
//!
//! This crate provides the cart and checkout service as a library,
//! allowing it to be tested and reused.
//!
//! - [`services::cart`] - cart reconciliation against the line item store
//! - [`db`] - `PostgreSQL` repositories backing the store
//! - [`routes`] - JSON handlers over the cart service

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::Router;
use tower_http::trace::TraceLayer;

use services::cart::LineItemStore;
use state::AppState;

/// Build the application router over `state`.
///
/// The session layer is left to the caller so tests can supply an in-memory
/// session store.
pub fn app<S: LineItemStore>(state: AppState<S>) -> Router {
    routes::routes()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
