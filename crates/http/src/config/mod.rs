//! Configuration for the session guard and the console client

pub mod session;

pub use session::{GuardConfig, RefreshMode};
