//! Session guard configuration

use crate::client::error::ClientError;
use console_core::{CoreError, CoreResult, ErrorContext};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// How the pre-request step treats a token that is about to expire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshMode {
    /// Send the cached token now and refresh in the background
    #[default]
    NonBlocking,
    /// Wait for the refresh before sending the request
    Blocking,
}

/// Complete guard and client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Base URL of the console backend
    pub base_url: String,
    /// Timeout applied to every request, the refresh call included
    pub request_timeout_secs: u64,
    /// Remaining lifetime below which a token counts as expiring soon
    pub expiring_soon_threshold_secs: u64,
    /// Period of the background expiry check
    pub check_interval_secs: u64,
    /// Pre-request behaviour for expiring tokens
    pub refresh_mode: RefreshMode,
    /// Window during which a repeated session notice is suppressed
    pub notice_window_secs: u64,
    /// Route the user is sent to when the session ends
    pub login_path: String,
    /// Delay between transient retries
    pub transient_retry_delay_ms: u64,
    /// Maximum transient retries for requests that opt in
    pub transient_max_retries: u32,
    /// Envelope code the backend reports for success
    pub success_code: i64,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            request_timeout_secs: 15,
            expiring_soon_threshold_secs: 10 * 60,
            check_interval_secs: 3 * 60,
            refresh_mode: RefreshMode::NonBlocking,
            notice_window_secs: 3,
            login_path: "/auth/login".to_string(),
            transient_retry_delay_ms: 1000,
            transient_max_retries: 2,
            success_code: 0,
        }
    }
}

impl GuardConfig {
    pub const ENV_PREFIX: &'static str = "CONSOLE";

    /// Load configuration with defaults and `CONSOLE_*` environment variables
    pub fn from_env() -> Result<Self, ClientError> {
        let settings = ::config::Config::builder()
            .add_source(::config::Config::try_from(&Self::default())?)
            .add_source(::config::Environment::with_prefix(Self::ENV_PREFIX).try_parsing(true))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validated()
    }

    /// Load configuration from a file, with environment variables on top
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let settings = ::config::Config::builder()
            .add_source(::config::Config::try_from(&Self::default())?)
            .add_source(::config::File::from(path))
            .add_source(::config::Environment::with_prefix(Self::ENV_PREFIX).try_parsing(true))
            .build()
            .with_context(|| format!("reading {}", path.display()))
            .map_err(ClientError::Configuration)?;

        let config: Self = settings.try_deserialize()?;
        config.validated()
    }

    /// Check the values that would make the guard misbehave
    pub fn validate(&self) -> CoreResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(CoreError::invalid_config("base_url must not be empty"));
        }
        if self.expiring_soon_threshold_secs == 0 {
            return Err(CoreError::invalid_config(
                "expiring_soon_threshold_secs must be greater than zero",
            ));
        }
        if self.check_interval_secs == 0 {
            return Err(CoreError::invalid_config(
                "check_interval_secs must be greater than zero",
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(CoreError::invalid_config(
                "request_timeout_secs must be greater than zero",
            ));
        }
        if !self.login_path.starts_with('/') {
            return Err(CoreError::invalid_config(
                "login_path must be an absolute route such as /auth/login",
            ));
        }
        Ok(())
    }

    fn validated(self) -> Result<Self, ClientError> {
        self.validate()
            .map_err(|e| ClientError::Configuration(e.to_string()))?;
        Ok(self)
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub const fn expiring_soon_threshold(&self) -> Duration {
        Duration::from_secs(self.expiring_soon_threshold_secs)
    }

    pub const fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub const fn notice_window(&self) -> Duration {
        Duration::from_secs(self.notice_window_secs)
    }

    pub const fn transient_retry_delay(&self) -> Duration {
        Duration::from_millis(self.transient_retry_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = GuardConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.expiring_soon_threshold(), Duration::from_secs(600));
        assert_eq!(config.check_interval(), Duration::from_secs(180));
        assert_eq!(config.refresh_mode, RefreshMode::NonBlocking);
        assert_eq!(config.success_code, 0);
    }

    #[test]
    fn test_validation_rejects_zero_interval() {
        let config = GuardConfig {
            check_interval_secs: 0,
            ..GuardConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CoreError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_validation_rejects_relative_login_path() {
        let config = GuardConfig {
            login_path: "login".to_string(),
            ..GuardConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("console.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "base_url = \"https://console.example.com\"").unwrap();
        writeln!(file, "expiring_soon_threshold_secs = 1800").unwrap();
        writeln!(file, "refresh_mode = \"blocking\"").unwrap();

        let config = GuardConfig::from_file(&path).unwrap();
        assert_eq!(config.base_url, "https://console.example.com");
        assert_eq!(config.expiring_soon_threshold(), Duration::from_secs(1800));
        assert_eq!(config.refresh_mode, RefreshMode::Blocking);
        assert_eq!(config.login_path, "/auth/login");
    }

    #[test]
    fn test_from_file_missing_is_configuration_error() {
        let result = GuardConfig::from_file("/nonexistent/console.toml");
        assert!(matches!(result, Err(ClientError::Configuration(msg)) if msg.contains("reading")));
    }
}
