//! Lightweight session metrics
//!
//! Counters and gauges are plain atomics that also emit a `debug!` event on
//! every change, so they show up in logs without a metrics backend.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use tracing::{debug, info};

/// A counter metric that can only increase
#[derive(Debug, Clone)]
pub struct Counter {
    name: &'static str,
    value: Arc<AtomicU64>,
}

impl Counter {
    /// Create a new counter
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            value: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Increment the counter by 1
    pub fn increment(&self) {
        let total = self.value.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(metric = "counter", name = self.name, total, "Counter incremented");
    }

    /// Get the current value
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// A gauge metric that can increase or decrease
#[derive(Debug, Clone)]
pub struct Gauge {
    name: &'static str,
    value: Arc<AtomicI64>,
}

impl Gauge {
    /// Create a new gauge
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            value: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Increment the gauge by 1
    pub fn increment(&self) {
        let value = self.value.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(metric = "gauge", name = self.name, value, "Gauge incremented");
    }

    /// Decrement the gauge by 1
    pub fn decrement(&self) {
        let value = self.value.fetch_sub(1, Ordering::Relaxed) - 1;
        debug!(metric = "gauge", name = self.name, value, "Gauge decremented");
    }

    /// Get the current value
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Counters describing the session guard's behaviour
#[derive(Debug, Clone)]
pub struct SessionMetrics {
    /// Refresh network calls issued
    pub refresh_started: Counter,
    /// Callers that joined a refresh already in flight
    pub refresh_coalesced: Counter,
    /// Refresh calls that failed or were rejected
    pub refresh_failed: Counter,
    /// Requests replayed after a 401
    pub requests_replayed: Counter,
    /// Sessions ended because they could not be renewed
    pub sessions_ended: Counter,
    /// Refresh calls currently in flight (0 or 1)
    pub refresh_in_flight: Gauge,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self {
            refresh_started: Counter::new("session.refresh.started"),
            refresh_coalesced: Counter::new("session.refresh.coalesced"),
            refresh_failed: Counter::new("session.refresh.failed"),
            requests_replayed: Counter::new("session.requests.replayed"),
            sessions_ended: Counter::new("session.ended"),
            refresh_in_flight: Gauge::new("session.refresh.in_flight"),
        }
    }

    /// Log every value at info level
    pub fn log_summary(&self) {
        info!(
            refresh_started = self.refresh_started.get(),
            refresh_coalesced = self.refresh_coalesced.get(),
            refresh_failed = self.refresh_failed.get(),
            requests_replayed = self.requests_replayed.get(),
            sessions_ended = self.sessions_ended.get(),
            refresh_in_flight = self.refresh_in_flight.get(),
            "Session metrics"
        );
    }
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_values() {
        let metrics = SessionMetrics::new();
        let clone = metrics.clone();

        clone.refresh_started.increment();
        clone.refresh_started.increment();
        clone.refresh_in_flight.increment();
        clone.refresh_in_flight.decrement();

        assert_eq!(metrics.refresh_started.get(), 2);
        assert_eq!(metrics.refresh_in_flight.get(), 0);
        assert_eq!(metrics.refresh_failed.get(), 0);
    }
}
