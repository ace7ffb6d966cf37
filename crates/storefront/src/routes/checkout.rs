//! Checkout route handlers.
//!
//! The order form lives on the server as a per-user checkout state. Placing
//! the order composes the message from the confirmed cart and returns the
//! messaging deep link; nothing is sent from here.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Serialize;
use tracing::instrument;

use stg_catalog_core::{CheckoutForm, CheckoutState, OrderLink};

use crate::error::Result;
use crate::middleware::OptionalIdentity;
use crate::services::cart::LineItemStore;
use crate::state::AppState;

/// Checkout state response.
#[derive(Debug, Serialize)]
pub struct CheckoutView {
    pub checkout: CheckoutState,
}

/// Whether the form as typed can be submitted.
#[derive(Debug, Serialize)]
pub struct FormStatus {
    pub can_submit: bool,
}

/// The handoff link for the placed order.
#[derive(Debug, Serialize)]
pub struct OrderPlaced {
    pub link: OrderLink,
}

/// Open the order form.
#[instrument(skip(state, identity))]
pub async fn start<S: LineItemStore>(
    State(state): State<AppState<S>>,
    OptionalIdentity(identity): OptionalIdentity,
) -> Result<Json<CheckoutView>> {
    let checkout = state.cart().begin_checkout(identity.as_ref()).await?;
    Ok(Json(CheckoutView { checkout }))
}

/// Close the order form.
#[instrument(skip(state, identity))]
pub async fn cancel<S: LineItemStore>(
    State(state): State<AppState<S>>,
    OptionalIdentity(identity): OptionalIdentity,
) -> Result<Json<CheckoutView>> {
    let checkout = state.cart().cancel_checkout(identity.as_ref()).await?;
    Ok(Json(CheckoutView { checkout }))
}

/// Check the form while it is being filled in.
#[instrument(skip(state, identity, form))]
pub async fn form_status<S: LineItemStore>(
    State(state): State<AppState<S>>,
    OptionalIdentity(identity): OptionalIdentity,
    Query(form): Query<CheckoutForm>,
) -> Result<Json<FormStatus>> {
    let can_submit = state.cart().can_submit(identity.as_ref(), &form).await?;
    Ok(Json(FormStatus { can_submit }))
}

/// Place the order and return the deep link.
#[instrument(skip(state, identity, form))]
pub async fn place_order<S: LineItemStore>(
    State(state): State<AppState<S>>,
    OptionalIdentity(identity): OptionalIdentity,
    Json(form): Json<CheckoutForm>,
) -> Result<Json<OrderPlaced>> {
    let link = state.cart().place_order(identity.as_ref(), &form).await?;
    Ok(Json(OrderPlaced { link }))
}
