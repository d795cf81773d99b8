//! Console core types and utilities
//!
//! Token inspection, the session triple and its storage, permission checks and
//! the logging setup shared by the console crates.

pub mod access;
pub mod error;
pub mod errors;
pub mod session;
pub mod store;
pub mod throttle;
pub mod token;
pub mod tracing;
pub mod types;

#[cfg(any(test, feature = "tests"))]
pub mod testing;

pub use access::{PermissionSet, ScopedPermissions};
pub use error::{CoreError, CoreResult, ErrorContext};
pub use errors::{Error, Result};
pub use session::{Session, SessionState};
pub use store::{FileStore, MemoryStore, SessionStore};
pub use throttle::NoticeThrottle;
pub use token::{AccessToken, Claims, TokenDecodeError};
pub use types::{SessionUser, UserRole};
