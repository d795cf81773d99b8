//! Fakes shared by the session unit tests

use super::{Navigator, Notifier, RefreshError, RefreshTransport, SessionGuard};
use crate::config::GuardConfig;
use async_trait::async_trait;
use console_core::testing::token_expiring_in;
use console_core::{AccessToken, MemoryStore, PermissionSet, Session, SessionState, SessionUser};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn admin() -> SessionUser {
    SessionUser {
        id: 1,
        username: "admin".to_string(),
        name: "Administrator".to_string(),
        ..SessionUser::default()
    }
}

pub fn admin_permissions() -> PermissionSet {
    ["system:user:list", "system:user:edit"]
        .into_iter()
        .map(String::from)
        .collect()
}

pub struct FakeTransport {
    calls: AtomicUsize,
    seen: Mutex<Vec<AccessToken>>,
    failure: Option<RefreshError>,
    ttl_secs: i64,
    delay: Duration,
}

impl FakeTransport {
    pub fn succeeding() -> Self {
        Self::issuing_ttl(3600)
    }

    pub fn issuing_ttl(ttl_secs: i64) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            failure: None,
            ttl_secs,
            delay: Duration::from_millis(10),
        }
    }

    pub fn failing(error: RefreshError) -> Self {
        Self {
            failure: Some(error),
            ..Self::succeeding()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<AccessToken> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl RefreshTransport for FakeTransport {
    async fn refresh(&self, current: &AccessToken) -> Result<Session, RefreshError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(current.clone());
        tokio::time::sleep(self.delay).await;

        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(Session::new(
                token_expiring_in(self.ttl_secs, "admin"),
                admin(),
                admin_permissions(),
            )),
        }
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    routes: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn routes(&self) -> Vec<String> {
        self.routes.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn replace(&self, path: &str) {
        self.routes.lock().unwrap().push(path.to_string());
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify_error(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

pub struct TestGuard {
    pub guard: SessionGuard,
    pub transport: Arc<FakeTransport>,
    pub navigator: Arc<RecordingNavigator>,
    pub notifier: Arc<RecordingNotifier>,
    pub store: Arc<MemoryStore>,
}

impl TestGuard {
    pub fn empty(transport: FakeTransport) -> Self {
        Self::build(None, transport, GuardConfig::default())
    }

    pub fn with_token(token: AccessToken, transport: FakeTransport) -> Self {
        Self::build(Some(token), transport, GuardConfig::default())
    }

    pub fn build(
        token: Option<AccessToken>,
        transport: FakeTransport,
        config: GuardConfig,
    ) -> Self {
        let store = Arc::new(MemoryStore::new());
        let session = Arc::new(SessionState::new(store.clone()));
        if let Some(token) = token {
            session
                .establish(Session::new(token, admin(), admin_permissions()))
                .unwrap();
        }

        let transport = Arc::new(transport);
        let navigator = Arc::new(RecordingNavigator::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let guard = SessionGuard::builder()
            .config(config)
            .session(session)
            .transport(transport.clone())
            .navigator(navigator.clone())
            .notifier(notifier.clone())
            .build()
            .unwrap();

        Self {
            guard,
            transport,
            navigator,
            notifier,
            store,
        }
    }
}
