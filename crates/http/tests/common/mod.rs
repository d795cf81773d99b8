//! Shared fixtures for the client integration tests

#![allow(dead_code)]

use console_core::{
    AccessToken, MemoryStore, PermissionSet, Session, SessionState, SessionUser,
};
use console_http::{ConsoleClient, GuardConfig, Navigator, Notifier};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use wiremock::MockServer;

/// Route crate logs to the test output; repeated calls are ignored
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("console_http=debug,console_core=debug")
        .with_test_writer()
        .try_init();
}

pub fn envelope(data: Value) -> Value {
    json!({"code": 0, "message": "ok", "data": data})
}

pub fn failure(code: i64, message: &str) -> Value {
    json!({"code": code, "message": message, "data": null})
}

pub fn session_payload(token: &AccessToken) -> Value {
    envelope(json!({
        "token": token.as_str(),
        "expires_at": token.expires_at().map(|at| at.to_rfc3339()),
        "user_info": {
            "id": 1,
            "username": "admin",
            "name": "Administrator",
            "status": 1,
            "roles": [{"id": 1, "name": "Super Admin", "code": "super_admin"}]
        },
        "permissions": ["system:user:list", "system:user:edit"]
    }))
}

pub fn bearer(token: &AccessToken) -> String {
    format!("Bearer {}", token.as_str())
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

pub struct Harness {
    pub client: ConsoleClient,
    pub store: Arc<MemoryStore>,
    pub navigator: Arc<RecordingNavigator>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new(server: &MockServer, token: Option<AccessToken>) -> Self {
        Self::with_config(server, token, GuardConfig::default())
    }

    pub fn with_config(
        server: &MockServer,
        token: Option<AccessToken>,
        config: GuardConfig,
    ) -> Self {
        init_logging();
        let store = Arc::new(MemoryStore::new());
        let session = Arc::new(SessionState::new(store.clone()));
        if let Some(token) = token {
            let user = SessionUser {
                id: 1,
                username: "admin".to_string(),
                ..SessionUser::default()
            };
            let permissions: PermissionSet =
                std::iter::once("system:user:list".to_string()).collect();
            session
                .establish(Session::new(token, user, permissions))
                .unwrap();
        }

        let navigator = Arc::new(RecordingNavigator::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let client = ConsoleClient::builder()
            .config(GuardConfig {
                base_url: server.uri(),
                transient_retry_delay_ms: 10,
                ..config
            })
            .session(session)
            .navigator(navigator.clone())
            .notifier(notifier.clone())
            .build()
            .unwrap();

        Self {
            client,
            store,
            navigator,
            notifier,
        }
    }

    pub fn token(&self) -> Option<AccessToken> {
        self.client.session().token()
    }
}
