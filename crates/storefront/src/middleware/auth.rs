//! Identity extractor and session helpers.
//!
//! The signed-in identity is written to the session only by
//! [`set_current_identity`] and removed only by [`clear_current_identity`];
//! handlers read it through [`OptionalIdentity`] and pass it to the cart
//! service, which refuses to touch the store without one.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use crate::models::{CurrentIdentity, session::keys};

/// Extractor that optionally gets the current identity.
///
/// Never rejects; a missing or unreadable session yields `None`.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(
///     OptionalIdentity(identity): OptionalIdentity,
/// ) -> impl IntoResponse {
///     match identity {
///         Some(i) => format!("Hello, {}!", i.contact),
///         None => "Hello, guest!".to_string(),
///     }
/// }
/// ```
pub struct OptionalIdentity(pub Option<CurrentIdentity>);

impl<S> FromRequestParts<S> for OptionalIdentity
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = match parts.extensions.get::<Session>() {
            Some(session) => session
                .get::<CurrentIdentity>(keys::CURRENT_IDENTITY)
                .await
                .ok()
                .flatten(),
            None => None,
        };

        Ok(Self(identity))
    }
}

/// Helper to set the current identity in the session (sign-in).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_identity(
    session: &Session,
    identity: &CurrentIdentity,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(keys::CURRENT_IDENTITY, identity).await
}

/// Helper to clear the current identity from the session (sign-out).
///
/// Returns the identity that was signed in, if any.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_identity(
    session: &Session,
) -> Result<Option<CurrentIdentity>, tower_sessions::session::Error> {
    session
        .remove::<CurrentIdentity>(keys::CURRENT_IDENTITY)
        .await
}
