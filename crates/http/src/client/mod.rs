//! Console HTTP client
//!
//! [`ConsoleClient`] sends every request through the [`SessionGuard`]: the
//! guard picks the bearer token, and a 401 gets one refresh followed by one
//! replay. Requests can also opt into fixed-delay retries on transient
//! statuses.

pub mod auth;
pub mod error;
pub mod public;
pub mod request;

pub use error::ClientError;
pub use public::PublicClient;
pub use request::{ApiRequest, RetryPolicy};

use crate::config::GuardConfig;
use crate::session::{Navigator, Notifier, SessionGuard};
use crate::types::Envelope;
use console_core::{AccessToken, SessionState};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// Session-aware console API client
#[derive(Debug, Clone)]
pub struct ConsoleClient {
    public: PublicClient,
    guard: SessionGuard,
    retry: RetryPolicy,
}

impl ConsoleClient {
    /// Create a client with default configuration and an in-memory session
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    pub fn builder() -> ConsoleClientBuilder {
        ConsoleClientBuilder::default()
    }

    pub fn base_url(&self) -> &str {
        self.public.base_url()
    }

    pub const fn guard(&self) -> &SessionGuard {
        &self.guard
    }

    pub const fn public(&self) -> &PublicClient {
        &self.public
    }

    pub fn session(&self) -> &Arc<SessionState> {
        self.guard.session()
    }

    pub const fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Send a request and deserialize the payload of the response envelope
    pub async fn send<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ClientError> {
        self.dispatch(request)
            .await?
            .into_data_with(self.public.success_code())
    }

    /// Send a request and return the whole successful envelope
    pub async fn send_full<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<Envelope<T>, ClientError> {
        self.dispatch(request).await?.into_typed()
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send(ApiRequest::get(path)).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        self.send(ApiRequest::post(path).json(body)?).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        self.send(ApiRequest::put(path).json(body)?).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send(ApiRequest::delete(path)).await
    }

    async fn dispatch(&self, mut request: ApiRequest) -> Result<Envelope<Value>, ClientError> {
        let mut transient_retries = 0;
        let mut replay_token = None;

        loop {
            match self.attempt(&request, replay_token.take()).await {
                Ok(envelope) => return Ok(envelope),
                Err(err) if err.is_auth_failure() => {
                    replay_token = Some(self.recover_from_unauthorized(&mut request, err).await?);
                }
                Err(err)
                    if request.retries_transient()
                        && self.retry.should_retry(transient_retries, &err) =>
                {
                    transient_retries += 1;
                    warn!(
                        method = %request.method(),
                        path = request.path(),
                        attempt = transient_retries,
                        error = %err,
                        "Transient failure; retrying"
                    );
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn attempt(
        &self,
        request: &ApiRequest,
        token: Option<AccessToken>,
    ) -> Result<Envelope<Value>, ClientError> {
        let token = match token {
            Some(token) => Some(token),
            None => self.guard.token_for_request().await,
        };

        let mut builder = self
            .public
            .request(request.method().clone(), request.path());
        if !request.query_pairs().is_empty() {
            builder = builder.query(request.query_pairs());
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }
        if let Some(token) = &token {
            builder = builder.bearer_auth(token.as_str());
        }

        trace!(
            method = %request.method(),
            path = request.path(),
            authenticated = token.is_some(),
            "Sending request"
        );
        public::read_envelope(builder.send().await?)
            .await?
            .check_with(self.public.success_code())
    }

    /// Refresh once for a rejected request and return the token to replay with
    ///
    /// A request that was already replayed, or that opted out, gets the 401
    /// back unchanged. Without a session there is nothing to refresh.
    async fn recover_from_unauthorized(
        &self,
        request: &mut ApiRequest,
        err: ClientError,
    ) -> Result<AccessToken, ClientError> {
        if !request.can_recover_auth() {
            if request.is_retried() {
                warn!(
                    method = %request.method(),
                    path = request.path(),
                    "Replayed request rejected again"
                );
            }
            return Err(err);
        }
        if !self.guard.session().is_active() {
            debug!(path = request.path(), "Unauthorized without a session");
            return Err(err);
        }

        warn!(
            method = %request.method(),
            path = request.path(),
            "Unauthorized; refreshing token and replaying once"
        );
        let token = self.guard.refresh().await?;
        request.mark_retried();
        self.guard.metrics().requests_replayed.increment();
        Ok(token)
    }
}

/// Builder for [`ConsoleClient`]
#[derive(Default)]
pub struct ConsoleClientBuilder {
    config: Option<GuardConfig>,
    base_url: Option<String>,
    session: Option<Arc<SessionState>>,
    navigator: Option<Arc<dyn Navigator>>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl ConsoleClientBuilder {
    pub fn config(mut self, config: GuardConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Override the configured base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Session to guard; defaults to an empty in-memory one
    pub fn session(mut self, session: Arc<SessionState>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn build(self) -> Result<ConsoleClient, ClientError> {
        let mut config = self.config.unwrap_or_default();
        if let Some(base_url) = self.base_url {
            config.base_url = base_url;
        }

        let public =
            PublicClient::with_timeout(config.base_url.clone(), Some(config.request_timeout()))?
                .with_success_code(config.success_code);
        let retry = RetryPolicy::from_config(&config);

        let mut guard = SessionGuard::builder()
            .config(config)
            .transport(Arc::new(public.clone()));
        if let Some(session) = self.session {
            guard = guard.session(session);
        }
        if let Some(navigator) = self.navigator {
            guard = guard.navigator(navigator);
        }
        if let Some(notifier) = self.notifier {
            guard = guard.notifier(notifier);
        }

        Ok(ConsoleClient {
            public,
            guard: guard.build()?,
            retry,
        })
    }
}
