//! Single-flight token refresh
//!
//! At most one refresh call is outstanding per guard. The call runs in its
//! own task; everyone who asks for a refresh while it is pending awaits the
//! same shared future and gets the same outcome. The task clears the
//! in-flight marker before its result becomes visible to any waiter.

use super::{GuardInner, SessionGuard};
use crate::client::error::ClientError;
use async_trait::async_trait;
use console_core::{AccessToken, Session};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use thiserror::Error;

/// Shared outcome of one refresh call
pub type SharedRefresh = Shared<BoxFuture<'static, Result<AccessToken, RefreshError>>>;

/// Why a refresh did not produce a new token
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    #[error("no session to refresh")]
    NoToken,

    #[error("refresh request failed: {0}")]
    Network(String),

    #[error("refresh rejected (code {code}): {message}")]
    Rejected { code: i64, message: String },

    #[error("session changed while refreshing")]
    Superseded,

    #[error("refresh task aborted: {0}")]
    Aborted(String),
}

impl From<ClientError> for RefreshError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Api { code, message } => Self::Rejected { code, message },
            ClientError::AuthenticationFailed(message) => Self::Rejected { code: 401, message },
            ClientError::Forbidden(message) => Self::Rejected { code: 403, message },
            ClientError::BadRequest(message) => Self::Rejected { code: 400, message },
            ClientError::SessionExpired(inner) => inner,
            other => Self::Network(other.to_string()),
        }
    }
}

/// Exchanges the current token for a fresh session
#[async_trait]
pub trait RefreshTransport: Send + Sync {
    async fn refresh(&self, current: &AccessToken) -> Result<Session, RefreshError>;
}

#[derive(Default)]
struct Slot {
    next_generation: u64,
    pending: Option<(u64, SharedRefresh)>,
}

/// In-flight marker shared by the request path and the scheduler
#[derive(Default)]
pub struct RefreshState {
    slot: Mutex<Slot>,
}

impl std::fmt::Debug for RefreshState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshState")
            .field("in_flight", &self.is_in_flight())
            .finish()
    }
}

impl RefreshState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_in_flight(&self) -> bool {
        self.lock().pending.is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clear the marker if it still belongs to `generation`
    fn settle(&self, generation: u64) {
        let mut slot = self.lock();
        if slot
            .pending
            .as_ref()
            .is_some_and(|(current, _)| *current == generation)
        {
            slot.pending = None;
        }
    }
}

impl SessionGuard {
    /// Join the pending refresh or start one
    ///
    /// The returned future can be dropped without cancelling the call.
    pub fn begin_refresh(&self) -> SharedRefresh {
        let state = Arc::clone(&self.inner.refresh_state);
        let mut slot = state.lock();

        if let Some((_, pending)) = &slot.pending {
            self.inner.metrics.refresh_coalesced.increment();
            debug!("Joining refresh already in flight");
            return pending.clone();
        }

        let generation = slot.next_generation;
        slot.next_generation = slot.next_generation.wrapping_add(1);

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let result = run_refresh(&inner).await;
            inner.refresh_state.settle(generation);
            result
        });

        let settle_state = Arc::clone(&state);
        let shared = async move {
            match task.await {
                Ok(result) => result,
                Err(err) => {
                    settle_state.settle(generation);
                    Err(RefreshError::Aborted(err.to_string()))
                }
            }
        }
        .boxed()
        .shared();

        slot.pending = Some((generation, shared.clone()));
        shared
    }

    /// Refresh the token, sharing the call with any refresh already pending
    pub async fn refresh(&self) -> Result<AccessToken, RefreshError> {
        self.begin_refresh().await
    }
}

async fn run_refresh(inner: &GuardInner) -> Result<AccessToken, RefreshError> {
    let Some(current) = inner.session.token() else {
        debug!("Refresh requested without a session");
        return Err(RefreshError::NoToken);
    };

    inner.metrics.refresh_started.increment();
    inner.metrics.refresh_in_flight.increment();
    let started = Instant::now();
    let outcome = inner
        .transport
        .refresh(&current)
        .await
        .and_then(|session| {
            if session.token.is_empty() {
                Err(RefreshError::Rejected {
                    code: 0,
                    message: "refresh response carried no token".to_string(),
                })
            } else {
                Ok(session)
            }
        });
    inner.metrics.refresh_in_flight.decrement();

    match outcome {
        Ok(session) => {
            let token = session.token.clone();
            match inner.session.replace_if_token(&current, session) {
                Ok(true) => {}
                Ok(false) => {
                    debug!("Session changed while refreshing; result not stored");
                    return Err(RefreshError::Superseded);
                }
                Err(err) => warn!(error = %err, "Refreshed session could not be persisted"),
            }
            info!(
                elapsed_ms = started.elapsed().as_millis(),
                expires_at = ?token.expires_at(),
                "Token refreshed"
            );
            Ok(token)
        }
        Err(err) => {
            inner.metrics.refresh_failed.increment();
            warn!(error = %err, "Token refresh failed");
            if !inner.expire_if_current(&current) {
                debug!("Session changed while refreshing; leaving it in place");
            }
            Err(err)
        }
    }
}
