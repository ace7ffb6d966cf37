//! Cart route handlers.
//!
//! JSON endpoints over the cart service. Every handler reads the identity
//! through [`OptionalIdentity`] and leaves the "signed in?" decision to the
//! service, so an anonymous request is refused before any store call.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use stg_catalog_core::{
    CheckoutState, CurrencyCode, LineItem, LineItemId, Money, ProductId, Quantity,
};

use crate::error::Result;
use crate::middleware::OptionalIdentity;
use crate::services::CartSnapshot;
use crate::services::cart::LineItemStore;
use crate::state::AppState;

/// How long the "added to cart" notice stays on screen.
pub const ACK_DISMISS_AFTER_MS: u64 = 2500;

/// Text of the "added to cart" notice.
const ACK_MESSAGE: &str = "✅ Item adicionado ao carrinho!";

/// Cart line display data.
#[derive(Debug, Clone, Serialize)]
pub struct CartItemView {
    pub id: LineItemId,
    pub product_id: ProductId,
    pub name: String,
    pub quantity: Quantity,
    pub unit_price: String,
    pub line_price: String,
}

/// Cart display data.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    /// Total as a plain two-decimal amount.
    pub total: String,
    /// Total with the currency label.
    pub total_display: String,
    pub item_count: u64,
    pub checkout: CheckoutState,
    pub checkout_available: bool,
    /// Products with an add still waiting for confirmation.
    pub pending: Vec<ProductId>,
}

impl CartView {
    fn from_snapshot(snapshot: &CartSnapshot, currency: CurrencyCode) -> Self {
        let cart = &snapshot.cart;
        let total = cart.total();
        Self {
            items: cart
                .items()
                .iter()
                .map(|item| CartItemView::new(item, currency))
                .collect(),
            total: total.format_amount(),
            total_display: total.display(currency),
            item_count: cart.unit_count(),
            checkout: snapshot.checkout.clone(),
            checkout_available: snapshot.checkout_available(),
            pending: snapshot.pending.clone(),
        }
    }
}

impl CartItemView {
    fn new(item: &LineItem, currency: CurrencyCode) -> Self {
        Self {
            id: item.id,
            product_id: item.product_id,
            name: item.product_name.clone(),
            quantity: item.quantity,
            unit_price: format_price(item.unit_price, currency),
            line_price: format_price(item.subtotal(), currency),
        }
    }
}

fn format_price(money: Money, currency: CurrencyCode) -> String {
    money.display(currency)
}

/// Add to cart request body.
#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: ProductId,
}

/// Update quantity request body. Zero or below removes the line.
#[derive(Debug, Deserialize)]
pub struct UpdateCartRequest {
    pub line_id: LineItemId,
    pub quantity: i64,
}

/// Remove line request body.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartRequest {
    pub line_id: LineItemId,
}

/// Transient acknowledgment shown after a successful add.
#[derive(Debug, Serialize)]
pub struct AddToCartAck {
    pub message: &'static str,
    pub line_id: LineItemId,
    pub quantity: Quantity,
    pub dismiss_after_ms: u64,
}

/// Cart badge count.
#[derive(Debug, Serialize)]
pub struct CartCount {
    pub count: u64,
}

/// Display the cart.
#[instrument(skip(state, identity))]
pub async fn show<S: LineItemStore>(
    State(state): State<AppState<S>>,
    OptionalIdentity(identity): OptionalIdentity,
) -> Result<Json<CartView>> {
    let snapshot = state.cart().cart(identity.as_ref()).await?;
    Ok(Json(view(&state, &snapshot)))
}

/// Add one unit of a product to the cart.
#[instrument(skip(state, identity))]
pub async fn add<S: LineItemStore>(
    State(state): State<AppState<S>>,
    OptionalIdentity(identity): OptionalIdentity,
    Json(request): Json<AddToCartRequest>,
) -> Result<Json<AddToCartAck>> {
    let outcome = state
        .cart()
        .add_to_cart(identity.as_ref(), request.product_id)
        .await?;

    Ok(Json(AddToCartAck {
        message: ACK_MESSAGE,
        line_id: outcome.line_id,
        quantity: outcome.quantity,
        dismiss_after_ms: ACK_DISMISS_AFTER_MS,
    }))
}

/// Set a line's quantity and return the updated cart.
#[instrument(skip(state, identity))]
pub async fn update<S: LineItemStore>(
    State(state): State<AppState<S>>,
    OptionalIdentity(identity): OptionalIdentity,
    Json(request): Json<UpdateCartRequest>,
) -> Result<Json<CartView>> {
    let outcome = state
        .cart()
        .set_quantity(identity.as_ref(), request.line_id, request.quantity)
        .await?;
    tracing::debug!(?outcome, "Cart line updated");

    let snapshot = state.cart().cart(identity.as_ref()).await?;
    Ok(Json(view(&state, &snapshot)))
}

/// Remove a line and return the updated cart.
#[instrument(skip(state, identity))]
pub async fn remove<S: LineItemStore>(
    State(state): State<AppState<S>>,
    OptionalIdentity(identity): OptionalIdentity,
    Json(request): Json<RemoveFromCartRequest>,
) -> Result<Json<CartView>> {
    let outcome = state
        .cart()
        .remove_item(identity.as_ref(), request.line_id)
        .await?;
    tracing::debug!(?outcome, "Cart line removed");

    let snapshot = state.cart().cart(identity.as_ref()).await?;
    Ok(Json(view(&state, &snapshot)))
}

/// Cart badge: total number of units.
#[instrument(skip(state, identity))]
pub async fn count<S: LineItemStore>(
    State(state): State<AppState<S>>,
    OptionalIdentity(identity): OptionalIdentity,
) -> Result<Json<CartCount>> {
    let snapshot = state.cart().cart(identity.as_ref()).await?;
    Ok(Json(CartCount {
        count: snapshot.cart.unit_count(),
    }))
}

pub(crate) fn view<S: LineItemStore>(state: &AppState<S>, snapshot: &CartSnapshot) -> CartView {
    CartView::from_snapshot(snapshot, state.cart().channel().currency())
}
