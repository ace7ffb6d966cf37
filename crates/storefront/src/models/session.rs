//! Session-related types.
//!
//! Types stored in the session for identity state.

use serde::{Deserialize, Serialize};

use stg_catalog_core::UserId;

/// Session-stored identity of the signed-in user.
///
/// Written once at sign-in and removed at sign-out; every cart operation
/// reads it through the auth extractors rather than from the session directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentIdentity {
    /// User ID assigned by the identity backend.
    pub user_id: UserId,
    /// Contact handle (email) shown in the order header.
    pub contact: String,
}

impl CurrentIdentity {
    /// Build an identity, trimming the contact handle.
    #[must_use]
    pub fn new(user_id: UserId, contact: &str) -> Self {
        Self {
            user_id,
            contact: contact.trim().to_owned(),
        }
    }
}

/// Session keys for identity data.
pub mod keys {
    /// Key for storing the current signed-in identity.
    pub const CURRENT_IDENTITY: &str = "current_identity";
}
