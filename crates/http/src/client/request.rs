//! Request description used by [`ConsoleClient`](super::ConsoleClient)
//!
//! A request is kept as plain data rather than a `reqwest::RequestBuilder` so
//! it can be sent again after a refresh or a transient failure.

use super::ClientError;
use crate::config::GuardConfig;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// An API call that can be replayed
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    transient_retry: bool,
    auth_recovery: bool,
    retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            transient_retry: false,
            auth_recovery: true,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append a query parameter
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Set a JSON body
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ClientError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Retry on 408, 502, 503 and 504 according to the client's policy
    pub const fn with_transient_retry(mut self) -> Self {
        self.transient_retry = true;
        self
    }

    /// Never refresh and replay this request on a 401
    pub const fn without_auth_recovery(mut self) -> Self {
        self.auth_recovery = false;
        self
    }

    pub const fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub const fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// `true` once the request has been replayed after a 401
    pub const fn is_retried(&self) -> bool {
        self.retried
    }

    pub(crate) const fn retries_transient(&self) -> bool {
        self.transient_retry
    }

    /// Eligible for one refresh and replay after a 401
    pub(crate) const fn can_recover_auth(&self) -> bool {
        self.auth_recovery && !self.retried
    }

    pub(crate) const fn mark_retried(&mut self) {
        self.retried = true;
    }
}

/// Fixed-delay retry for transient failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    pub const fn from_config(config: &GuardConfig) -> Self {
        Self::new(config.transient_max_retries, config.transient_retry_delay())
    }

    /// Whether a request that failed `retries_so_far` times gets another attempt
    pub fn should_retry(&self, retries_so_far: u32, err: &ClientError) -> bool {
        retries_so_far < self.max_retries && err.is_transient()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&GuardConfig::default())
    }
}
