//! Access-token decoding (payload only).
//!
//! Tokens are JWS compact serializations: `header.payload.signature`, each
//! segment base64url-encoded. Only the payload is read. The signature is not
//! checked; this client has no verification key and the backend verifies
//! every token it receives.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{AccessClaims, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenDecodeError {
    #[error("expected 3 dot-separated segments, found {0}")]
    Segments(usize),

    #[error("payload is not base64url: {0}")]
    Base64(String),

    #[error("payload is not a claims object: {0}")]
    Claims(String),
}

/// Decode the claims of an access token without verifying its signature.
pub fn decode_claims(token: &str) -> Result<AccessClaims, TokenDecodeError> {
    let segments: Vec<&str> = token.trim().split('.').collect();
    if segments.len() != 3 {
        return Err(TokenDecodeError::Segments(segments.len()));
    }

    // Some encoders pad; JWS forbids it, so tolerate rather than reject.
    let payload = segments[1].trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| TokenDecodeError::Base64(e.to_string()))?;

    serde_json::from_slice(&bytes).map_err(|e| TokenDecodeError::Claims(e.to_string()))
}

/// Role claim of a token, or `None`.
///
/// Never fails: an absent, expired-and-garbled or rotating token is an
/// expected transient state, so every decode failure is logged and reported
/// as "no role".
pub fn decode_role(token: Option<&str>) -> Option<Role> {
    let Some(token) = token else {
        debug!("no access token; treating as no role");
        return None;
    };

    match decode_claims(token) {
        Ok(claims) => {
            // A blank claim is what a backend writes when it clears a role.
            let role = claims.user_role.filter(|r| !r.as_str().trim().is_empty());
            if role.is_none() {
                debug!(user_id = %claims.sub, "access token carries no role claim");
            }
            role
        }
        Err(e) => {
            warn!(error = %e, "failed to decode access token; treating as no role");
            None
        }
    }
}

/// Seconds until the token expires, `None` if undecodable or already expired.
pub fn seconds_until_expiry(token: &str, now: DateTime<Utc>) -> Option<i64> {
    let claims = decode_claims(token).ok()?;
    let seconds = (claims.exp - now).num_seconds();
    (seconds > 0).then_some(seconds)
}

/// Whether the token expires within `threshold_secs`.
///
/// Undecodable and expired tokens count as expiring.
pub fn is_expiring_within(token: &str, threshold_secs: i64, now: DateTime<Utc>) -> bool {
    match seconds_until_expiry(token, now) {
        Some(secs) => secs <= threshold_secs,
        None => true,
    }
}
