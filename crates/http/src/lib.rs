//! Session-aware HTTP client for the admin console
//!
//! The client attaches the current bearer token to every request, refreshes
//! it through a single shared call when it is about to expire, replays a
//! request once after a 401 and sends the user back to the login route when
//! the session cannot be renewed.

#[macro_use]
extern crate tracing;

pub mod client;
pub mod config;
pub mod session;
pub mod types;

pub use client::{ApiRequest, ClientError, ConsoleClient, ConsoleClientBuilder, PublicClient};
pub use config::{GuardConfig, RefreshMode};
pub use session::{
    LogNavigator, Navigator, Notifier, RefreshError, RefreshTimer, RefreshTransport, SessionCheck,
    SessionGuard, TracingNotifier,
};
pub use types::Envelope;
