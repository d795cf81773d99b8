//! Access token inspection
//!
//! Tokens are JWT-shaped (`header.payload.signature`). Only the payload is
//! decoded and the signature is never checked; the server stays the authority
//! on validity, this module only answers whether a refresh is due.
//!
//! Every query is fail-safe: a token that cannot be decoded is reported as
//! expired so the caller is pushed towards re-authentication.

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Reasons a token payload could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenDecodeError {
    #[error("expected 3 dot-separated segments, found {0}")]
    Segments(usize),

    #[error("payload is not valid base64: {0}")]
    Base64(String),

    #[error("payload is not a claims object: {0}")]
    Claims(String),
}

/// The subset of token claims the session guard cares about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Expiration time (seconds since the Unix epoch)
    pub exp: i64,
    /// Issued at (seconds since the Unix epoch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

impl Claims {
    /// Expiration as milliseconds since the epoch, saturating on overflow
    pub const fn expires_at_millis(&self) -> i64 {
        self.exp.saturating_mul(1000)
    }
}

/// Decode the unverified payload segment of a token
pub fn decode_claims(token: &str) -> Result<Claims, TokenDecodeError> {
    let segments: Vec<&str> = token.split('.').collect();
    let [_, payload, _] = segments.as_slice() else {
        return Err(TokenDecodeError::Segments(segments.len()));
    };

    // JWTs use base64url without padding, but some issuers pad or use the
    // standard alphabet.
    let payload = payload.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD_NO_PAD.decode(payload))
        .map_err(|e| TokenDecodeError::Base64(e.to_string()))?;

    serde_json::from_slice(&bytes).map_err(|e| TokenDecodeError::Claims(e.to_string()))
}

/// Expiry in epoch milliseconds, or `None` when the token cannot be decoded
fn expiry_millis(token: &str) -> Option<i64> {
    match decode_claims(token) {
        Ok(claims) => Some(claims.expires_at_millis()),
        Err(error) => {
            debug!(%error, "Failed to decode access token, treating it as expired");
            None
        }
    }
}

fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// `true` once `now >= exp`
pub fn is_expired_at(token: &str, now: DateTime<Utc>) -> bool {
    expiry_millis(token).is_none_or(|exp| now.timestamp_millis() >= exp)
}

/// `true` once `now >= exp`, using the current time
pub fn is_expired(token: &str) -> bool {
    is_expired_at(token, Utc::now())
}

/// `true` when less than `threshold` is left before expiry
pub fn is_expiring_soon_at(token: &str, threshold: Duration, now: DateTime<Utc>) -> bool {
    expiry_millis(token).is_none_or(|exp| {
        exp.saturating_sub(now.timestamp_millis()) < duration_millis(threshold)
    })
}

/// `true` when less than `threshold` is left before expiry, using the current time
pub fn is_expiring_soon(token: &str, threshold: Duration) -> bool {
    is_expiring_soon_at(token, threshold, Utc::now())
}

/// Time left before expiry, zero for expired or undecodable tokens
pub fn remaining_time_at(token: &str, now: DateTime<Utc>) -> Duration {
    expiry_millis(token)
        .map(|exp| exp.saturating_sub(now.timestamp_millis()))
        .and_then(|millis| u64::try_from(millis).ok())
        .map_or(Duration::ZERO, Duration::from_millis)
}

/// Time left before expiry using the current time
pub fn remaining_time(token: &str) -> Duration {
    remaining_time_at(token, Utc::now())
}

/// Bearer credential issued by the console backend
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a raw token string
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The raw token
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the raw token
    pub fn into_inner(self) -> String {
        self.0
    }

    /// `true` when the raw token is empty
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decode the payload claims
    pub fn claims(&self) -> Result<Claims, TokenDecodeError> {
        decode_claims(&self.0)
    }

    /// Expiry instant, if the payload can be decoded
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let claims = self.claims().ok()?;
        Utc.timestamp_opt(claims.exp, 0).single()
    }

    pub fn is_expired(&self) -> bool {
        is_expired(&self.0)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        is_expired_at(&self.0, now)
    }

    pub fn is_expiring_soon(&self, threshold: Duration) -> bool {
        is_expiring_soon(&self.0, threshold)
    }

    pub fn is_expiring_soon_at(&self, threshold: Duration, now: DateTime<Utc>) -> bool {
        is_expiring_soon_at(&self.0, threshold, now)
    }

    pub fn remaining_time(&self) -> Duration {
        remaining_time(&self.0)
    }

    pub fn remaining_time_at(&self, now: DateTime<Utc>) -> Duration {
        remaining_time_at(&self.0, now)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the credential itself.
        f.debug_struct("AccessToken")
            .field("expires_at", &self.expires_at())
            .finish_non_exhaustive()
    }
}

impl From<String> for AccessToken {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for AccessToken {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}
