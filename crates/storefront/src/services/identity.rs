//! Identity handoff signatures.
//!
//! The identity backend authenticates the user and then posts the result to
//! `POST /session`. It signs each request with the secret it shares with the
//! storefront:
//!
//! ```text
//! X-Identity-Timestamp: <unix seconds>
//! X-Identity-Signature: v1=<hex HMAC-SHA256 of "v1:<timestamp>:<raw body>">
//! ```
//!
//! Requests older than five minutes are refused so a captured request cannot
//! be replayed later.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

/// Header carrying the signing time.
pub const TIMESTAMP_HEADER: &str = "x-identity-timestamp";
/// Header carrying the signature.
pub const SIGNATURE_HEADER: &str = "x-identity-signature";

const SIGNATURE_VERSION: &str = "v1";
const MAX_SKEW: Duration = Duration::from_secs(300);

type HmacSha256 = Hmac<Sha256>;

/// Reasons a signed handoff is refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing {0} header")]
    MissingHeader(&'static str),
    #[error("invalid timestamp")]
    InvalidTimestamp,
    #[error("request timestamp outside the accepted window")]
    Stale,
    #[error("signature mismatch")]
    Mismatch,
    #[error("invalid signing key")]
    InvalidKey,
}

/// Signs and verifies identity handoff requests.
#[derive(Clone)]
pub struct IdentityVerifier {
    secret: SecretString,
}

impl std::fmt::Debug for IdentityVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityVerifier")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl IdentityVerifier {
    /// Create a verifier over the shared secret.
    #[must_use]
    pub const fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// The `X-Identity-Signature` value for `body` signed at `timestamp`.
    ///
    /// # Errors
    ///
    /// Returns `SignatureError::InvalidKey` if the secret cannot key HMAC.
    pub fn sign(&self, timestamp: u64, body: &[u8]) -> Result<String, SignatureError> {
        let tag = self.mac(&timestamp.to_string(), body)?.finalize().into_bytes();
        Ok(format!("{SIGNATURE_VERSION}={}", hex::encode(tag)))
    }

    /// Verify a request against the current time.
    ///
    /// # Errors
    ///
    /// Returns `SignatureError` if a header is missing or malformed, the
    /// timestamp is outside the accepted window, or the signature does not
    /// match the body.
    pub fn verify(
        &self,
        timestamp: Option<&str>,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<(), SignatureError> {
        self.verify_at(timestamp, signature, body, unix_now())
    }

    fn verify_at(
        &self,
        timestamp: Option<&str>,
        signature: Option<&str>,
        body: &[u8],
        now: u64,
    ) -> Result<(), SignatureError> {
        let timestamp = timestamp.ok_or(SignatureError::MissingHeader(TIMESTAMP_HEADER))?;
        let signature = signature.ok_or(SignatureError::MissingHeader(SIGNATURE_HEADER))?;

        let signed_at: u64 = timestamp
            .parse()
            .map_err(|_| SignatureError::InvalidTimestamp)?;
        if now.abs_diff(signed_at) > MAX_SKEW.as_secs() {
            return Err(SignatureError::Stale);
        }

        let provided = signature
            .strip_prefix(SIGNATURE_VERSION)
            .and_then(|rest| rest.strip_prefix('='))
            .and_then(|hex_tag| hex::decode(hex_tag).ok())
            .ok_or(SignatureError::Mismatch)?;

        // verify_slice compares in constant time
        self.mac(timestamp, body)?
            .verify_slice(&provided)
            .map_err(|_| SignatureError::Mismatch)?;

        debug!("Identity handoff signature verified");
        Ok(())
    }

    fn mac(&self, timestamp: &str, body: &[u8]) -> Result<HmacSha256, SignatureError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| SignatureError::InvalidKey)?;
        mac.update(SIGNATURE_VERSION.as_bytes());
        mac.update(b":");
        mac.update(timestamp.as_bytes());
        mac.update(b":");
        mac.update(body);
        Ok(mac)
    }
}

/// Current Unix time in seconds.
#[must_use]
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const NOW: u64 = 1_760_000_000;
    const BODY: &[u8] = br#"{"user_id":"6f1c","contact":"ana@example.com"}"#;

    fn verifier() -> IdentityVerifier {
        IdentityVerifier::new(SecretString::from("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%"))
    }

    #[test]
    fn test_signed_request_verifies() {
        let v = verifier();
        let signature = v.sign(NOW, BODY).unwrap();
        assert!(signature.starts_with("v1="));
        assert_eq!(
            v.verify_at(Some(&NOW.to_string()), Some(&signature), BODY, NOW + 10),
            Ok(())
        );
    }

    #[test]
    fn test_tampered_body_is_refused() {
        let v = verifier();
        let signature = v.sign(NOW, BODY).unwrap();
        let tampered = br#"{"user_id":"0000","contact":"ana@example.com"}"#;
        assert_eq!(
            v.verify_at(Some(&NOW.to_string()), Some(&signature), tampered, NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_other_secret_is_refused() {
        let other = IdentityVerifier::new(SecretString::from("zZ9!yY8@xX7#wW6$vV5%uU4^tT3&sS2*"));
        let signature = other.sign(NOW, BODY).unwrap();
        assert_eq!(
            verifier().verify_at(Some(&NOW.to_string()), Some(&signature), BODY, NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_stale_timestamp_is_refused() {
        let v = verifier();
        let signature = v.sign(NOW, BODY).unwrap();
        assert_eq!(
            v.verify_at(Some(&NOW.to_string()), Some(&signature), BODY, NOW + 301),
            Err(SignatureError::Stale)
        );
        assert_eq!(
            v.verify_at(Some(&NOW.to_string()), Some(&signature), BODY, NOW - 301),
            Err(SignatureError::Stale)
        );
    }

    #[test]
    fn test_missing_or_malformed_headers() {
        let v = verifier();
        let signature = v.sign(NOW, BODY).unwrap();
        assert_eq!(
            v.verify_at(None, Some(&signature), BODY, NOW),
            Err(SignatureError::MissingHeader(TIMESTAMP_HEADER))
        );
        assert_eq!(
            v.verify_at(Some(&NOW.to_string()), None, BODY, NOW),
            Err(SignatureError::MissingHeader(SIGNATURE_HEADER))
        );
        assert_eq!(
            v.verify_at(Some("yesterday"), Some(&signature), BODY, NOW),
            Err(SignatureError::InvalidTimestamp)
        );
        assert_eq!(
            v.verify_at(Some(&NOW.to_string()), Some("v1=not-hex"), BODY, NOW),
            Err(SignatureError::Mismatch)
        );
        let unversioned = signature.trim_start_matches("v1=");
        assert_eq!(
            v.verify_at(Some(&NOW.to_string()), Some(unversioned), BODY, NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        assert!(!format!("{:?}", verifier()).contains("aB3$"));
    }
}
