//! Identity session handlers.
//!
//! Authentication itself happens in the identity backend; these endpoints
//! only record the resulting identity in the session and drop it again. The
//! backend signs every sign-in with the shared identity secret (see
//! [`crate::services::identity`]), so a client cannot name its own user.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use stg_catalog_core::UserId;

use crate::error::{AppError, Result, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::middleware::{clear_current_identity, set_current_identity};
use crate::models::CurrentIdentity;
use crate::services::cart::LineItemStore;
use crate::services::identity::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::state::AppState;

/// Sign-in request body, as issued by the identity backend.
#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub user_id: UserId,
    pub contact: String,
}

/// Record the signed-in identity.
///
/// The signature covers the raw body, so it is checked before the body is
/// parsed.
#[instrument(skip_all)]
pub async fn sign_in<S: LineItemStore>(
    State(state): State<AppState<S>>,
    session: Session,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    if let Err(e) = state
        .identity()
        .verify(header(TIMESTAMP_HEADER), header(SIGNATURE_HEADER), &body)
    {
        tracing::warn!(error = %e, "Rejected unsigned or invalid sign-in");
        return Err(e.into());
    }

    let request: SignInRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("invalid sign-in body: {e}")))?;

    let identity = CurrentIdentity::new(request.user_id, &request.contact);
    if identity.contact.is_empty() {
        return Err(AppError::BadRequest("contact is required".to_string()));
    }

    // New identity, new session ID
    session.cycle_id().await?;
    set_current_identity(&session, &identity).await?;

    set_sentry_user(&identity.user_id, Some(&identity.contact));
    add_breadcrumb("auth", "Signed in", None);
    tracing::info!(user_id = %identity.user_id, "Identity recorded");

    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Forget the identity and its in-memory cart session.
#[instrument(skip(state, session))]
pub async fn sign_out<S: LineItemStore>(
    State(state): State<AppState<S>>,
    session: Session,
) -> Response {
    match clear_current_identity(&session).await {
        Ok(Some(identity)) => state.cart().end_session(identity.user_id).await,
        Ok(None) => {}
        Err(e) => tracing::error!("Failed to clear session: {}", e),
    }

    if let Err(e) = session.flush().await {
        tracing::error!("Failed to flush session: {}", e);
    }

    clear_sentry_user();
    StatusCode::NO_CONTENT.into_response()
}
