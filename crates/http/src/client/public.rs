//! Client for calls made outside the session guard
//!
//! Login and token refresh go through [`PublicClient`]: they must never
//! trigger a refresh themselves, so they bypass the 401 replay path.

use super::ClientError;
use crate::session::{RefreshError, RefreshTransport};
use crate::types::{Envelope, LoginResponse, RefreshRequest};
use async_trait::async_trait;
use console_core::{AccessToken, Session};
use reqwest::{Client, ClientBuilder, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

pub const REFRESH_PATH: &str = "/admin-api/auth/refresh";

const USER_AGENT: &str = concat!("console-client/", env!("CARGO_PKG_VERSION"));

/// Unauthenticated client sharing the connection pool of a [`ConsoleClient`](super::ConsoleClient)
#[derive(Debug, Clone)]
pub struct PublicClient {
    client: Client,
    base_url: String,
    success_code: i64,
}

impl PublicClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, None)
    }

    /// Create a client whose requests time out after `timeout`
    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, ClientError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ClientError::Configuration("base_url is required".into()));
        }

        let mut builder = ClientBuilder::new().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url,
            success_code: Envelope::<Value>::SUCCESS,
        })
    }

    /// Treat envelopes carrying `code` as successful
    #[must_use]
    pub fn with_success_code(mut self, code: i64) -> Self {
        self.success_code = code;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub const fn success_code(&self) -> i64 {
        self.success_code
    }

    /// Create a request builder without authentication
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client.request(method, url)
    }

    /// Send a request and read the response envelope
    ///
    /// Non-2xx statuses become [`ClientError::from_status`]; the envelope is
    /// returned as-is, business code included.
    pub async fn execute_envelope(
        &self,
        request: RequestBuilder,
    ) -> Result<Envelope<Value>, ClientError> {
        read_envelope(request.send().await?).await
    }

    /// Send a request and deserialize the payload of a successful envelope
    pub async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        self.execute_envelope(request)
            .await?
            .into_data_with(self.success_code)
    }
}

pub(crate) async fn read_envelope(
    response: reqwest::Response,
) -> Result<Envelope<Value>, ClientError> {
    let status = response.status();

    if status.is_success() {
        Ok(response.json().await?)
    } else {
        let body = response.text().await.unwrap_or_else(|_| status.to_string());
        // error bodies usually still carry an envelope with a readable message
        let message = serde_json::from_str::<Envelope<Value>>(&body)
            .map(|envelope| envelope.message)
            .ok()
            .filter(|message| !message.is_empty())
            .unwrap_or(body);
        Err(ClientError::from_status(status, message))
    }
}

#[async_trait]
impl RefreshTransport for PublicClient {
    async fn refresh(&self, current: &AccessToken) -> Result<Session, RefreshError> {
        let request = self
            .request(Method::POST, REFRESH_PATH)
            .bearer_auth(current.as_str())
            .json(&RefreshRequest {
                refresh_token: current.as_str().to_string(),
            });

        let response: LoginResponse = self.execute(request).await?;
        Ok(response.into())
    }
}
