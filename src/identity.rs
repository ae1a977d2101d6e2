//! Caller identity from the bearer token.
//!
//! The backend puts the account email in the JWT subject claim. Decoding is
//! purely structural (base64 payload + JSON), no signature verification: the
//! token is only trusted for display and for "is this mine" comparisons, the
//! server re-checks authorization on every call.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("malformed token: {reason}")]
    Malformed { reason: String },

    #[error("token has no subject claim")]
    MissingSubject,
}

#[derive(Deserialize)]
struct Claims {
    #[serde(default)]
    sub: Option<String>,
}

/// Decodes the caller identity out of a JWT's payload segment.
pub fn decode_caller(token: &str) -> Result<CallerIdentity, IdentityError> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_)) => payload,
        _ => {
            return Err(IdentityError::Malformed {
                reason: "expected three dot-separated segments".into(),
            })
        }
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| IdentityError::Malformed {
            reason: format!("payload is not base64url: {e}"),
        })?;

    let claims: Claims = serde_json::from_slice(&bytes).map_err(|e| IdentityError::Malformed {
        reason: format!("payload is not a JSON object: {e}"),
    })?;

    claims
        .sub
        .filter(|sub| !sub.is_empty())
        .map(|email| CallerIdentity { email })
        .ok_or(IdentityError::MissingSubject)
}
