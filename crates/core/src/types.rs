use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Identity of the signed-in console user, as returned with every token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default)]
    pub status: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<UserRole>,
    /// Fields this crate does not model, kept so they survive a store round trip
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl SessionUser {
    /// Name to show in the UI: display name, then nickname, then username
    pub fn display_name(&self) -> &str {
        if !self.name.is_empty() {
            &self.name
        } else if let Some(nickname) = self.nickname.as_deref().filter(|n| !n.is_empty()) {
            nickname
        } else {
            &self.username
        }
    }

    /// Check whether the user holds a role by code
    pub fn has_role(&self, code: &str) -> bool {
        self.roles.iter().any(|role| role.code == code)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRole {
    pub id: i64,
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub description: String,
}
