//! Host integration points: route changes and user-visible notices

use std::sync::{Mutex, PoisonError};

/// Moves the host application to another route
///
/// `replace` must not push a history entry, so going back never lands on a
/// page that belonged to the ended session.
pub trait Navigator: Send + Sync {
    fn replace(&self, path: &str);

    /// Route currently shown, when the host knows it
    fn current_path(&self) -> Option<String> {
        None
    }
}

/// Shows an error notice to the user
pub trait Notifier: Send + Sync {
    fn notify_error(&self, message: &str);
}

/// Navigator for hosts without routing; records the last route and logs it
#[derive(Debug, Default)]
pub struct LogNavigator {
    current: Mutex<Option<String>>,
}

impl LogNavigator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Navigator for LogNavigator {
    fn replace(&self, path: &str) {
        info!(path, "Navigating");
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(path.to_string());
    }

    fn current_path(&self) -> Option<String> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Notifier that writes notices to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify_error(&self, message: &str) {
        warn!(notice = message, "Session notice");
    }
}
