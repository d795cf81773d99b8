//! Client error types

use crate::session::RefreshError;
use thiserror::Error;

/// Statuses worth retrying when a request opts into transient retries
const TRANSIENT_STATUSES: [u16; 4] = [408, 502, 503, 504];

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or request error
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server returned an error status
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Authentication failed (HTTP 401 or envelope code 401)
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Forbidden
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The envelope carried a non-zero business code
    #[error("Request rejected (code {code}): {message}")]
    Api { code: i64, message: String },

    /// The session could not be renewed and has been ended
    #[error("Session expired: {0}")]
    SessionExpired(#[from] RefreshError),

    /// Reading or writing the session store failed
    #[error("Session storage error: {0}")]
    Session(#[from] console_core::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Create error from HTTP status code
    pub fn from_status(status: reqwest::StatusCode, message: String) -> Self {
        match status.as_u16() {
            400 => Self::BadRequest(message),
            401 => Self::AuthenticationFailed(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            _ => Self::ServerError {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// Create error from a non-zero envelope code
    pub fn from_envelope(code: i64, message: String) -> Self {
        match code {
            401 => Self::AuthenticationFailed(message),
            403 => Self::Forbidden(message),
            _ => Self::Api { code, message },
        }
    }

    /// `true` when the server rejected the credentials
    pub const fn is_auth_failure(&self) -> bool {
        matches!(self, Self::AuthenticationFailed(_))
    }

    /// `true` for failures that may succeed on a later attempt
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ServerError { status, .. } => TRANSIENT_STATUSES.contains(status),
            Self::Api { code, .. } => {
                u16::try_from(*code).is_ok_and(|code| TRANSIENT_STATUSES.contains(&code))
            }
            Self::Request(err) => err.is_timeout() || err.is_connect(),
            _ => false,
        }
    }
}

impl From<::config::ConfigError> for ClientError {
    fn from(err: ::config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}
