//! Logging setup and session metrics

pub mod config;
pub mod init;
pub mod metrics;

pub use config::{InstrumentationConfig, LogFormat};
pub use init::{init_dev, init_tracing};
pub use metrics::{Counter, Gauge, SessionMetrics};
