//! Helpers for minting unsigned tokens in tests

use crate::token::AccessToken;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};

/// Build a JWT-shaped token whose payload carries `exp` and `sub`
pub fn token_expiring_at(exp: DateTime<Utc>, subject: &str) -> AccessToken {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(
        serde_json::json!({
            "sub": subject,
            "exp": exp.timestamp(),
            "iat": Utc::now().timestamp(),
        })
        .to_string(),
    );
    AccessToken::new(format!("{header}.{payload}.unsigned"))
}

/// Token expiring `seconds` from now (negative for already expired)
pub fn token_expiring_in(seconds: i64, subject: &str) -> AccessToken {
    token_expiring_at(Utc::now() + chrono::Duration::seconds(seconds), subject)
}
