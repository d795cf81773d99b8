pub mod permissions;

pub use permissions::{PermissionSet, ScopedPermissions};
