//! Session guard
//!
//! [`SessionGuard`] owns the token lifecycle for one signed-in user: it picks
//! the token each request goes out with, coalesces refreshes into a single
//! network call, runs the background expiry check and ends the session
//! (notice plus login redirect) when the token cannot be renewed.

mod navigation;
mod refresh;
mod scheduler;
#[cfg(test)]
pub(crate) mod test_support;

pub use navigation::{LogNavigator, Navigator, Notifier, TracingNotifier};
pub use refresh::{RefreshError, RefreshState, RefreshTransport, SharedRefresh};
pub use scheduler::{RefreshTimer, SessionCheck};

use crate::client::error::ClientError;
use crate::config::{GuardConfig, RefreshMode};
use console_core::tracing::SessionMetrics;
use console_core::{AccessToken, MemoryStore, NoticeThrottle, SessionState};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Notice category for sessions that could not be renewed
pub const SESSION_EXPIRED_NOTICE: &str = "session_expired";

const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired, please sign in again";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EndReason {
    /// Token expired or could not be refreshed
    Expired,
    /// The user signed out
    SignedOut,
}

/// Cheaply cloneable handle to the guard state
#[derive(Clone)]
pub struct SessionGuard {
    inner: Arc<GuardInner>,
}

struct GuardInner {
    config: GuardConfig,
    session: Arc<SessionState>,
    transport: Arc<dyn RefreshTransport>,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,
    notices: NoticeThrottle,
    refresh_state: Arc<RefreshState>,
    metrics: SessionMetrics,
    auto_refresh: Mutex<Option<CancellationToken>>,
}

impl std::fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGuard")
            .field("session", &self.inner.session)
            .field("refresh_state", &self.inner.refresh_state)
            .finish_non_exhaustive()
    }
}

impl SessionGuard {
    pub fn builder() -> SessionGuardBuilder {
        SessionGuardBuilder::default()
    }

    pub fn config(&self) -> &GuardConfig {
        &self.inner.config
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.inner.session
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.inner.metrics
    }

    /// `true` while a refresh call is outstanding
    pub fn is_refreshing(&self) -> bool {
        self.inner.refresh_state.is_in_flight()
    }

    /// Token to attach to an outgoing request
    ///
    /// Returns `None` when there is no session or the token has already
    /// expired. A token inside the expiring-soon window is refreshed in the
    /// background or awaited first, depending on [`RefreshMode`].
    pub async fn token_for_request(&self) -> Option<AccessToken> {
        let token = self.inner.session.token()?;

        if token.is_expired() {
            debug!("Cached token expired; sending request without it");
            return None;
        }

        if !token.is_expiring_soon(self.inner.config.expiring_soon_threshold()) {
            return Some(token);
        }

        match self.inner.config.refresh_mode {
            RefreshMode::NonBlocking => {
                drop(self.begin_refresh());
                Some(token)
            }
            RefreshMode::Blocking => match self.refresh().await {
                Ok(fresh) => Some(fresh),
                Err(err) => {
                    debug!(error = %err, "Pre-request refresh failed; using cached token");
                    Some(token)
                }
            },
        }
    }

    /// Force the session to end as if the token could not be renewed
    pub fn expire_session(&self) {
        self.inner.end_session(EndReason::Expired);
    }

    pub(crate) fn sign_out(&self) {
        self.inner.end_session(EndReason::SignedOut);
    }
}

impl GuardInner {
    fn end_session(&self, reason: EndReason) {
        if let Err(err) = self.session.clear() {
            warn!(error = %err, "Session store could not be cleared");
        }
        self.session_ended(reason);
    }

    /// End the session if `token` still belongs to it
    ///
    /// Returns `false` when a sign-out or a new sign-in replaced the session
    /// first; nothing is cleared, shown or redirected in that case.
    fn expire_if_current(&self, token: &AccessToken) -> bool {
        let ended = self.session.clear_if_token(token).unwrap_or_else(|err| {
            warn!(error = %err, "Session store could not be cleared");
            true
        });
        if ended {
            self.session_ended(EndReason::Expired);
        }
        ended
    }

    fn session_ended(&self, reason: EndReason) {
        if reason == EndReason::Expired {
            self.metrics.sessions_ended.increment();
            if self.notices.should_show(SESSION_EXPIRED_NOTICE) {
                self.notifier.notify_error(SESSION_EXPIRED_MESSAGE);
            } else {
                debug!("Session notice suppressed");
            }
        }

        self.redirect_to_login();
    }

    fn redirect_to_login(&self) {
        let login = self.config.login_path.as_str();
        if self.navigator.current_path().as_deref() == Some(login) {
            debug!(path = login, "Already on the login route");
            return;
        }
        info!(path = login, "Redirecting to login");
        self.navigator.replace(login);
    }
}

/// Builder for [`SessionGuard`]
#[derive(Default)]
pub struct SessionGuardBuilder {
    config: Option<GuardConfig>,
    session: Option<Arc<SessionState>>,
    transport: Option<Arc<dyn RefreshTransport>>,
    navigator: Option<Arc<dyn Navigator>>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl SessionGuardBuilder {
    pub fn config(mut self, config: GuardConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Session to guard; defaults to an empty in-memory one
    pub fn session(mut self, session: Arc<SessionState>) -> Self {
        self.session = Some(session);
        self
    }

    /// Backend used for refresh calls (required)
    pub fn transport(mut self, transport: Arc<dyn RefreshTransport>) -> Self {
        self.transport = Some(transport);
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

    pub fn build(self) -> Result<SessionGuard, ClientError> {
        let config = self.config.unwrap_or_default();
        config
            .validate()
            .map_err(|e| ClientError::Configuration(e.to_string()))?;

        let transport = self
            .transport
            .ok_or_else(|| ClientError::Configuration("refresh transport is required".into()))?;

        let session = self
            .session
            .unwrap_or_else(|| Arc::new(SessionState::new(Arc::new(MemoryStore::new()))));

        Ok(SessionGuard {
            inner: Arc::new(GuardInner {
                notices: NoticeThrottle::new(config.notice_window()),
                config,
                session,
                transport,
                navigator: self
                    .navigator
                    .unwrap_or_else(|| Arc::new(LogNavigator::new())),
                notifier: self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier)),
                refresh_state: Arc::new(RefreshState::new()),
                metrics: SessionMetrics::new(),
                auto_refresh: Mutex::new(None),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::test_support::{FakeTransport, TestGuard};
    use console_core::testing::token_expiring_in;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn blocking() -> GuardConfig {
        GuardConfig {
            refresh_mode: RefreshMode::Blocking,
            ..GuardConfig::default()
        }
    }

    #[tokio::test]
    async fn test_valid_token_is_used_as_is() {
        let token = token_expiring_in(3600, "admin");
        let harness = TestGuard::with_token(token.clone(), FakeTransport::succeeding());

        assert_eq!(harness.guard.token_for_request().await, Some(token));
        assert!(!harness.guard.is_refreshing());
    }

    #[tokio::test]
    async fn test_non_blocking_sends_cached_token_and_refreshes_behind() {
        let token = token_expiring_in(60, "admin");
        let harness = TestGuard::with_token(token.clone(), FakeTransport::succeeding());

        assert_eq!(harness.guard.token_for_request().await, Some(token.clone()));
        assert!(harness.guard.is_refreshing());

        let fresh = harness.guard.refresh().await.unwrap();
        assert_ne!(fresh, token);
        assert_eq!(harness.transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_blocking_waits_for_fresh_token() {
        let token = token_expiring_in(60, "admin");
        let harness =
            TestGuard::build(Some(token.clone()), FakeTransport::succeeding(), blocking());

        let sent = harness.guard.token_for_request().await.unwrap();
        assert_ne!(sent, token);
        assert_eq!(harness.guard.session().token(), Some(sent));
    }

    #[tokio::test]
    async fn test_blocking_falls_back_to_cached_token_when_refresh_fails() {
        let token = token_expiring_in(60, "admin");
        let harness = TestGuard::build(
            Some(token.clone()),
            FakeTransport::failing(RefreshError::Network("connection reset".to_string())),
            blocking(),
        );

        assert_eq!(harness.guard.token_for_request().await, Some(token));
        assert_eq!(harness.transport.calls(), 1);
        assert!(!harness.guard.session().is_active());
        assert_eq!(harness.navigator.routes(), vec!["/auth/login".to_string()]);
        assert_eq!(harness.notifier.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_expired_token_is_not_sent() {
        let harness =
            TestGuard::with_token(token_expiring_in(-1, "admin"), FakeTransport::succeeding());
        assert_eq!(harness.guard.token_for_request().await, None);
    }

    #[tokio::test]
    async fn test_repeated_expiry_notices_are_throttled() {
        let harness = TestGuard::empty(FakeTransport::succeeding());

        harness.guard.expire_session();
        harness.guard.expire_session();

        assert_eq!(harness.notifier.messages().len(), 1);
        assert_eq!(harness.navigator.routes().len(), 2);
        assert_eq!(harness.guard.metrics().sessions_ended.get(), 2);
    }

    #[tokio::test]
    async fn test_sign_out_redirects_without_notice() {
        let harness =
            TestGuard::with_token(token_expiring_in(3600, "admin"), FakeTransport::succeeding());

        harness.guard.sign_out();

        assert!(!harness.guard.session().is_active());
        assert!(harness.notifier.messages().is_empty());
        assert_eq!(harness.navigator.routes(), vec!["/auth/login".to_string()]);
    }

    #[test]
    fn test_no_redirect_when_already_on_login() {
        #[derive(Default)]
        struct OnLoginPage(AtomicUsize);

        impl Navigator for OnLoginPage {
            fn replace(&self, _path: &str) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }

            fn current_path(&self) -> Option<String> {
                Some("/auth/login".to_string())
            }
        }

        let navigator = Arc::new(OnLoginPage::default());
        let guard = SessionGuard::builder()
            .transport(Arc::new(FakeTransport::succeeding()))
            .navigator(navigator.clone())
            .build()
            .unwrap();

        guard.expire_session();
        assert_eq!(navigator.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_builder_requires_transport() {
        assert!(matches!(
            SessionGuard::builder().build(),
            Err(ClientError::Configuration(_))
        ));
    }
}
