//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use stg_catalog_core::CheckoutError;

use crate::db::RepositoryError;
use crate::services::{CartError, SignatureError};
use crate::services::cart::StoreError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Cart or checkout operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Sign-in handoff signature was missing or did not verify.
    #[error("Identity signature error: {0}")]
    Signature(#[from] SignatureError),

    /// Session store operation failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Cart(err) => match err {
                CartError::IdentityMissing => StatusCode::UNAUTHORIZED,
                CartError::InvalidQuantity(_) => StatusCode::UNPROCESSABLE_ENTITY,
                CartError::Checkout(CheckoutError::NotComposing(_)) => StatusCode::CONFLICT,
                CartError::Checkout(_) => StatusCode::UNPROCESSABLE_ENTITY,
                CartError::Store(StoreError::UnknownProduct(_)) => StatusCode::NOT_FOUND,
                CartError::Store(e) if e.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
                CartError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Signature(SignatureError::InvalidKey)
            | Self::Database(_)
            | Self::Session(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Signature(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Whether the client may retry the same request.
    fn retryable(&self) -> bool {
        matches!(self, Self::Cart(err) if err.is_transient())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry; transient store failures are
        // already reported as warnings by the cart service.
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Cart(CartError::Store(e)) if e.is_transient() => {
                "The cart is temporarily unavailable, please try again".to_string()
            }
            Self::Cart(CartError::Store(StoreError::UnknownProduct(_))) => {
                "Product not found".to_string()
            }
            Self::Signature(SignatureError::InvalidKey)
            | Self::Cart(CartError::Store(_))
            | Self::Database(_)
            | Self::Session(_)
            | Self::Internal(_) => "Internal server error".to_string(),
            Self::Signature(_) => "Invalid identity signature".to_string(),
            Self::Cart(err) => err.to_string(),
            Self::BadRequest(msg) => msg.clone(),
        };

        let body = json!({
            "error": message,
            "retryable": self.retryable(),
        });

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after sign-in to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on sign-out to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("product_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
