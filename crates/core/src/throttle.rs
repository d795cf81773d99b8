//! Per-category rate limiting for user-visible notices
//!
//! When many requests fail at once they all want to tell the user the same
//! thing. A notice is shown at most once per window for each category.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Tracks when each notice category was last shown
#[derive(Debug)]
pub struct NoticeThrottle {
    window: Duration,
    last_shown: Mutex<HashMap<String, Instant>>,
}

impl NoticeThrottle {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_shown: Mutex::new(HashMap::new()),
        }
    }

    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Returns `true` and records the time if the category may be shown now
    pub fn should_show(&self, category: &str) -> bool {
        self.should_show_at(category, Instant::now())
    }

    /// Same as [`Self::should_show`] with an explicit clock reading
    pub fn should_show_at(&self, category: &str, now: Instant) -> bool {
        let mut last_shown = self
            .last_shown
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        match last_shown.get(category) {
            Some(last) if now.saturating_duration_since(*last) < self.window => false,
            _ => {
                last_shown.insert(category.to_string(), now);
                true
            }
        }
    }

    /// Forget a category so its next notice is shown immediately
    pub fn reset(&self, category: &str) {
        self.last_shown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(category);
    }
}

impl Default for NoticeThrottle {
    fn default() -> Self {
        Self::new(Duration::from_secs(3))
    }
}
