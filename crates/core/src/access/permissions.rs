use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeSet;

/// Flat set of permission codes granted to the session user
///
/// Codes look like `system.admin_user:list`: a resource path, a colon, then the
/// action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<String>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check for an exact permission code
    pub fn has(&self, code: &str) -> bool {
        self.0.contains(code)
    }

    /// Check whether any of the codes is granted (false for no codes)
    pub fn has_any<'a>(&self, codes: impl IntoIterator<Item = &'a str>) -> bool {
        codes.into_iter().any(|code| self.has(code))
    }

    /// Check whether all of the codes are granted (true for no codes)
    pub fn has_all<'a>(&self, codes: impl IntoIterator<Item = &'a str>) -> bool {
        codes.into_iter().all(|code| self.has(code))
    }

    /// View that expands bare action names with a resource prefix
    pub const fn scoped<'a>(&'a self, prefix: &'a str) -> ScopedPermissions<'a> {
        ScopedPermissions { set: self, prefix }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Permission checks relative to a resource prefix
///
/// `scoped("system.admin_user").has("list")` checks `system.admin_user:list`.
/// Codes that already contain a colon are used as-is.
#[derive(Debug, Clone, Copy)]
pub struct ScopedPermissions<'a> {
    set: &'a PermissionSet,
    prefix: &'a str,
}

impl ScopedPermissions<'_> {
    fn qualify<'c>(&self, code: &'c str) -> Cow<'c, str> {
        if self.prefix.is_empty() || code.contains(':') {
            Cow::Borrowed(code)
        } else {
            Cow::Owned(format!("{}:{code}", self.prefix))
        }
    }

    pub fn has(&self, code: &str) -> bool {
        self.set.has(&self.qualify(code))
    }

    pub fn has_any<'a>(&self, codes: impl IntoIterator<Item = &'a str>) -> bool {
        codes.into_iter().any(|code| self.has(code))
    }

    pub fn has_all<'a>(&self, codes: impl IntoIterator<Item = &'a str>) -> bool {
        codes.into_iter().all(|code| self.has(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn permissions() -> PermissionSet {
        ["system.admin_user:list", "system.admin_user:create", "system.role:list"]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_exact_checks() {
        let set = permissions();
        assert!(set.has("system.role:list"));
        assert!(!set.has("system.role:delete"));
        assert!(set.has_any(["system.role:delete", "system.role:list"]));
        assert!(!set.has_all(["system.role:delete", "system.role:list"]));
    }

    #[test]
    fn test_empty_code_lists() {
        let set = permissions();
        assert!(!set.has_any([]));
        assert!(set.has_all([]));
    }

    #[test]
    fn test_scoped_checks() {
        let set = permissions();
        let users = set.scoped("system.admin_user");
        assert!(users.has("list"));
        assert!(users.has_all(["list", "create"]));
        assert!(!users.has("delete"));
        // Fully qualified codes bypass the prefix
        assert!(users.has("system.role:list"));
    }

    #[test]
    fn test_empty_prefix_uses_code_verbatim() {
        let set = permissions();
        assert!(!set.scoped("").has("list"));
        assert!(set.scoped("").has("system.role:list"));
    }

    #[test]
    fn test_deserializes_from_code_array() {
        let set: PermissionSet =
            serde_json::from_str(r#"["user:list","user:list","user:create"]"#).unwrap();
        assert_eq!(set.len(), 2);
    }
}
