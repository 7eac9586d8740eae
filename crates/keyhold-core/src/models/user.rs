use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::auth::{AccessLevel, Session};

/// Body of `POST /auth/login`.
#[derive(Clone, Default, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

// Passwords never reach Debug output (and therefore never reach the logs)
impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password_len", &self.password.len())
            .finish()
    }
}

/// Body of `POST /auth/register`.
#[derive(Clone, Default, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password_len", &self.password.len())
            .finish()
    }
}

/// Success body shared by login and register.
///
/// Every field is optional on the wire; a usable response carries at least
/// a token and a user id. `roles` and `redirectUrl` are informational.
#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default, deserialize_with = "deserialize_id")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub access: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub redirect_url: Option<String>,
}

impl AuthResponse {
    /// The bearer token, if the server sent a non-empty one
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }

    /// Build a session from this response.
    ///
    /// Returns `None` unless both the token and the user id are present.
    /// A missing or empty `access` becomes [`AccessLevel::User`].
    pub fn into_session(self) -> Option<Session> {
        let token = self.token.filter(|t| !t.is_empty())?;
        let user_id = self.user_id.filter(|id| !id.is_empty())?;
        Some(Session {
            user_id,
            name: self.name.unwrap_or_default(),
            email: self.email.unwrap_or_default(),
            access_level: AccessLevel::from_wire(self.access.as_deref()),
            token,
        })
    }
}

/// Account record returned by `GET /auth/{id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default, deserialize_with = "deserialize_id")]
    pub id: Option<String>,
    pub name: Option<String>,
    pub surname: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub nationality: Option<String>,
    pub bio: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    pub created_date: Option<String>,
}

impl UserProfile {
    pub fn display_name(&self) -> String {
        match (self.name.as_deref(), self.surname.as_deref()) {
            (Some(first), Some(last)) if !last.is_empty() => format!("{} {}", first, last),
            (Some(first), _) => first.to_string(),
            (None, Some(last)) => last.to_string(),
            (None, None) => "Unknown".to_string(),
        }
    }
}

/// Accept ids sent either as JSON strings or as numbers.
fn deserialize_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
