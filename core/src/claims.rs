//! Bearer token inspection.
//!
//! Tokens are three dot-separated base64url segments. Only the payload is
//! read; the signature is never verified here. Absent payload fields come
//! back as `None`, so callers can tell "field missing" apart from
//! "token malformed".

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use chrono::Utc;
use serde_json::{Map, Value};

use crate::error::CredentialError;
use crate::types::Role;

/// Base64url that accepts the payload with or without `=` padding.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Claims read from a token payload. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Claims {
    /// `sub`, a numeric user id (sent as a string by the backend).
    pub subject_user_id: Option<i64>,
    pub email: Option<String>,
    /// `role` as sent; see `Claims::role`.
    pub role: Option<String>,
    /// `name`
    pub display_name: Option<String>,
    /// `exp`, epoch seconds.
    pub expires_at: Option<i64>,
}

impl Claims {
    /// The `role` claim, if it names a known role.
    pub fn role(&self) -> Option<Role> {
        self.role.as_deref().and_then(|r| r.parse().ok())
    }

    /// Expired iff `now_millis >= exp * 1000`. A missing `exp` counts as
    /// expired at epoch zero.
    pub fn is_expired_at(&self, now_millis: i64) -> bool {
        let exp_millis = self.expires_at.unwrap_or(0).saturating_mul(1000);
        now_millis >= exp_millis
    }
}

/// Decode the payload segment of `token`.
pub fn decode(token: &str) -> Result<Claims, CredentialError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(malformed(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    }

    let bytes = PAYLOAD_ENGINE
        .decode(segments[1])
        .map_err(|e| malformed(format!("payload is not base64url: {e}")))?;
    let payload: Map<String, Value> = serde_json::from_slice(&bytes)
        .map_err(|e| malformed(format!("payload is not a JSON object: {e}")))?;

    Ok(Claims {
        subject_user_id: subject(&payload)?,
        email: string_claim(&payload, "email"),
        role: string_claim(&payload, "role"),
        display_name: string_claim(&payload, "name"),
        expires_at: expiry(&payload)?,
    })
}

/// Decode and require an unexpired `exp`.
pub fn validate(token: &str) -> Result<Claims, CredentialError> {
    validate_at(token, Utc::now().timestamp_millis())
}

pub fn validate_at(token: &str, now_millis: i64) -> Result<Claims, CredentialError> {
    let claims = decode(token)?;
    if claims.is_expired_at(now_millis) {
        return Err(CredentialError::Expired {
            expires_at: claims.expires_at,
        });
    }
    Ok(claims)
}

/// Fail-closed expiry check: a token that cannot be decoded is expired.
pub fn is_expired(token: &str) -> bool {
    is_expired_at(token, Utc::now().timestamp_millis())
}

pub fn is_expired_at(token: &str, now_millis: i64) -> bool {
    match decode(token) {
        Ok(claims) => claims.is_expired_at(now_millis),
        Err(_) => true,
    }
}

pub fn user_id_from_token(token: &str) -> Option<i64> {
    decode(token).ok()?.subject_user_id
}

pub fn role_from_token(token: &str) -> Option<Role> {
    decode(token).ok()?.role()
}

pub fn name_from_token(token: &str) -> Option<String> {
    decode(token).ok()?.display_name
}

fn malformed(reason: String) -> CredentialError {
    tracing::debug!(%reason, "rejecting bearer token");
    CredentialError::Malformed(reason)
}

fn string_claim(payload: &Map<String, Value>, key: &str) -> Option<String> {
    match payload.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// `sub` may arrive as `"42"` or `42`. Anything else that is present is a
/// malformed token.
fn subject(payload: &Map<String, Value>) -> Result<Option<i64>, CredentialError> {
    match payload.get("sub") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| malformed(format!("sub is not an integer: {n}"))),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| malformed(format!("sub is not numeric: {s:?}"))),
        Some(other) => Err(malformed(format!("sub has unexpected type: {other}"))),
    }
}

fn expiry(payload: &Map<String, Value>) -> Result<Option<i64>, CredentialError> {
    match payload.get("exp") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => match (n.as_i64(), n.as_f64()) {
            (Some(secs), _) => Ok(Some(secs)),
            (None, Some(secs)) => Ok(Some(secs as i64)),
            _ => Err(malformed(format!("exp is out of range: {n}"))),
        },
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| malformed(format!("exp is not numeric: {s:?}"))),
        Some(other) => Err(malformed(format!("exp has unexpected type: {other}"))),
    }
}
