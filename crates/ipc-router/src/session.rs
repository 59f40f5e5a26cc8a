//! Session boundary
//!
//! The router only consumes a session store; it never creates, mutates or
//! revokes sessions. Lookups are best effort and every failure mode is
//! reported as "no session".

use crate::context::SenderId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Argument fields recognized as carrying a session token
pub const TOKEN_FIELDS: [&str; 2] = ["token", "sessionToken"];

/// Session record resolved from a token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub user_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    /// Backend access token issued at login, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Minimal identity attached to a context when a session resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub user_id: String,
}

impl From<&Session> for UserIdentity {
    fn from(session: &Session) -> Self {
        Self {
            user_id: session.user_id.clone(),
        }
    }
}

/// Store the router queries during context construction
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Resolve a token to a live session
    async fn lookup(&self, token: &str) -> Option<Session>;

    /// Backend access token bound to a window/connection
    async fn resolve_access_token(&self, sender: &SenderId) -> Option<String>;
}

/// Find a session token in raw call arguments.
///
/// Object payloads are checked directly; array payloads (variadic calls)
/// are checked on their first element only.
pub fn extract_token(args: &Value) -> Option<&str> {
    let candidate = match args {
        Value::Array(items) => items.first()?,
        other => other,
    };

    let object = candidate.as_object()?;
    TOKEN_FIELDS
        .iter()
        .filter_map(|field| object.get(*field).and_then(|v| v.as_str()))
        .find(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_token_from_object() {
        assert_eq!(extract_token(&json!({ "token": "abc" })), Some("abc"));
        assert_eq!(extract_token(&json!({ "sessionToken": "xyz", "id": 4 })), Some("xyz"));
    }

    #[test]
    fn test_extract_token_from_first_array_element() {
        assert_eq!(extract_token(&json!([{ "token": "abc" }, 3])), Some("abc"));
        assert_eq!(extract_token(&json!([3, { "token": "abc" }])), None);
    }

    #[test]
    fn test_extract_token_ignores_unusable_values() {
        assert_eq!(extract_token(&json!({ "token": "" })), None);
        assert_eq!(extract_token(&json!({ "token": 42 })), None);
        assert_eq!(extract_token(&json!("token")), None);
        assert_eq!(extract_token(&Value::Null), None);
        assert_eq!(extract_token(&json!([])), None);
    }

    #[test]
    fn test_session_expiry_and_roles() {
        let session = Session {
            token: "t".to_string(),
            user_id: "nurse-7".to_string(),
            display_name: None,
            roles: vec!["perawat".to_string()],
            access_token: None,
            created_at: Utc::now(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
        };
        assert!(!session.is_expired());
        assert!(session.has_role("perawat"));
        assert!(!session.has_role("dokter"));
        assert_eq!(UserIdentity::from(&session).user_id, "nurse-7");

        let expired = Session {
            expires_at: Utc::now() - chrono::Duration::minutes(1),
            ..session
        };
        assert!(expired.is_expired());
    }
}
