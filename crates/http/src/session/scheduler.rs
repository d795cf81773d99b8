//! Periodic expiry check

use super::SessionGuard;
use std::sync::PoisonError;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// What a single expiry check found and did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCheck {
    /// No token; nothing to do
    NoSession,
    /// Token already expired; the session was ended
    Expired,
    /// Token expiring soon; a refresh was started or joined
    Refreshing,
    /// Token good for longer than the threshold
    Valid,
}

/// Handle for the background check loop
///
/// Stopping the timer ends the loop but leaves a refresh that is already in
/// flight to settle normally.
#[derive(Debug)]
#[must_use = "dropping the timer stops automatic refresh"]
pub struct RefreshTimer {
    cancel: CancellationToken,
}

impl RefreshTimer {
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            info!("Stopping auto refresh");
            self.cancel.cancel();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl SessionGuard {
    /// Inspect the current token once and act on it
    pub fn check_session(&self) -> SessionCheck {
        let Some(token) = self.inner.session.token() else {
            return SessionCheck::NoSession;
        };

        if token.is_expired() {
            info!("Session token expired");
            self.inner.expire_if_current(&token);
            return SessionCheck::Expired;
        }

        if token.is_expiring_soon(self.inner.config.expiring_soon_threshold()) {
            debug!(
                remaining_secs = token.remaining_time().as_secs(),
                "Token expiring soon; refreshing"
            );
            // the call runs in its own task and handles its own failure
            drop(self.begin_refresh());
            return SessionCheck::Refreshing;
        }

        SessionCheck::Valid
    }

    /// Check now, then every `check_interval` until the timer is stopped
    ///
    /// Only one loop runs per guard: starting again stops the loop of the
    /// previous call.
    pub fn start_auto_refresh(&self) -> RefreshTimer {
        let period = self.inner.config.check_interval();
        let cancel = CancellationToken::new();

        let previous = self
            .inner
            .auto_refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(cancel.clone());
        if let Some(previous) = previous.filter(|token| !token.is_cancelled()) {
            info!("Auto refresh already running; restarting it");
            previous.cancel();
        }

        let initial = self.check_session();
        info!(
            period_secs = period.as_secs(),
            initial = ?initial,
            "Auto refresh started"
        );

        let guard = self.clone();
        let stopped = cancel.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    () = stopped.cancelled() => break,
                    _ = ticker.tick() => {
                        let outcome = guard.check_session();
                        trace!(?outcome, "Session check");
                    }
                }
            }
            debug!("Auto refresh loop finished");
        });

        RefreshTimer { cancel }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::test_support::{FakeTransport, TestGuard};
    use console_core::testing::token_expiring_in;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_first_check_runs_immediately() {
        let harness =
            TestGuard::with_token(token_expiring_in(5, "admin"), FakeTransport::succeeding());

        let _timer = harness.guard.start_auto_refresh();
        assert!(harness.guard.is_refreshing());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(harness.transport.calls(), 1);
        assert!(!harness.guard.is_refreshing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_keep_refreshing_short_lived_tokens() {
        let harness = TestGuard::with_token(
            token_expiring_in(5, "admin"),
            FakeTransport::issuing_ttl(30),
        );

        let _timer = harness.guard.start_auto_refresh();
        tokio::time::sleep(Duration::from_secs(7 * 60)).await;

        // immediate check plus ticks at 3 and 6 minutes
        assert_eq!(harness.transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_checks_but_lets_refresh_finish() {
        let harness = TestGuard::with_token(
            token_expiring_in(5, "admin"),
            FakeTransport::issuing_ttl(30).with_delay(Duration::from_secs(2)),
        );
        let old = harness.guard.session().token();

        let timer = harness.guard.start_auto_refresh();
        assert!(harness.guard.is_refreshing());
        timer.stop();
        assert!(timer.is_stopped());

        tokio::time::sleep(Duration::from_secs(10 * 60)).await;

        assert_eq!(harness.transport.calls(), 1);
        assert_ne!(harness.guard.session().token(), old);
        assert!(harness.guard.session().is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_replaces_running_loop() {
        let harness = TestGuard::with_token(
            token_expiring_in(5, "admin"),
            FakeTransport::issuing_ttl(30),
        );

        let first = harness.guard.start_auto_refresh();
        let _second = harness.guard.start_auto_refresh();
        assert!(first.is_stopped());

        tokio::time::sleep(Duration::from_secs(7 * 60)).await;

        // immediate check plus ticks at 3 and 6 minutes from a single loop
        assert_eq!(harness.transport.calls(), 3);
        // only the second immediate check joined a call already in flight
        assert_eq!(harness.guard.metrics().refresh_coalesced.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_timer_stops_checks() {
        let harness = TestGuard::with_token(
            token_expiring_in(5, "admin"),
            FakeTransport::issuing_ttl(30),
        );

        drop(harness.guard.start_auto_refresh());
        tokio::time::sleep(Duration::from_secs(10 * 60)).await;

        assert_eq!(harness.transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_expired_token_ends_session() {
        let harness =
            TestGuard::with_token(token_expiring_in(-10, "admin"), FakeTransport::succeeding());

        assert_eq!(harness.guard.check_session(), SessionCheck::Expired);
        assert!(!harness.guard.session().is_active());
        assert_eq!(harness.navigator.routes(), vec!["/auth/login".to_string()]);
        assert_eq!(harness.transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_no_session_and_valid_token_do_nothing() {
        let empty = TestGuard::empty(FakeTransport::succeeding());
        assert_eq!(empty.guard.check_session(), SessionCheck::NoSession);
        assert!(empty.navigator.routes().is_empty());

        let valid =
            TestGuard::with_token(token_expiring_in(3600, "admin"), FakeTransport::succeeding());
        assert_eq!(valid.guard.check_session(), SessionCheck::Valid);
        assert!(!valid.guard.is_refreshing());
    }
}
