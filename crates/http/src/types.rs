//! Wire types for the console REST API
//!
//! Every endpoint answers with an [`Envelope`]: `code == 0` means success and
//! `data` carries the payload; any other code is a business error described
//! by `message`. Backends that report success as `200` are handled through
//! the `_with` variants and [`GuardConfig::success_code`](crate::GuardConfig).

use crate::client::error::ClientError;
use console_core::{AccessToken, PermissionSet, Session, SessionUser};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Standard response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub code: i64,
    #[serde(default, alias = "msg")]
    pub message: String,
    #[serde(default)]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// Default code reported by successful calls
    pub const SUCCESS: i64 = 0;

    pub const fn is_success(&self) -> bool {
        self.is_success_with(Self::SUCCESS)
    }

    pub const fn is_success_with(&self, success_code: i64) -> bool {
        self.code == success_code
    }
}

impl Envelope<Value> {
    /// Turn a business error into a [`ClientError`], leaving successes as-is
    pub fn check(self) -> Result<Self, ClientError> {
        self.check_with(Self::SUCCESS)
    }

    pub fn check_with(self, success_code: i64) -> Result<Self, ClientError> {
        if self.is_success_with(success_code) {
            Ok(self)
        } else {
            Err(ClientError::from_envelope(self.code, self.message))
        }
    }

    /// Deserialize the payload; a missing `data` is read as JSON `null`
    pub fn into_data<T: DeserializeOwned>(self) -> Result<T, ClientError> {
        self.into_data_with(Self::SUCCESS)
    }

    pub fn into_data_with<T: DeserializeOwned>(self, success_code: i64) -> Result<T, ClientError> {
        let data = self.check_with(success_code)?.data.unwrap_or(Value::Null);
        Ok(serde_json::from_value(data)?)
    }

    /// Re-type the envelope, keeping code and message
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<Envelope<T>, ClientError> {
        let data = self.data.map(serde_json::from_value).transpose()?;
        Ok(Envelope {
            code: self.code,
            message: self.message,
            data,
        })
    }
}

/// Login credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub captcha: String,
}

/// Refresh request; the current access token doubles as the refresh credential
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Payload returned by login and refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: AccessToken,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    pub user_info: SessionUser,
    #[serde(default)]
    pub permissions: PermissionSet,
}

impl From<LoginResponse> for Session {
    fn from(response: LoginResponse) -> Self {
        Self::new(response.token, response.user_info, response.permissions)
    }
}

/// Payload of the profile endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub user_info: SessionUser,
    #[serde(default)]
    pub permissions: PermissionSet,
}

/// Editable profile fields
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdateRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Password change for the signed-in user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordChangeRequest {
    pub old_password: String,
    pub new_password: String,
}
