use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::store::{KeyValueStore, StoreChange};

// Persisted layout: five independent string entries
pub const TOKEN_KEY: &str = "token";
pub const USER_ID_KEY: &str = "userId";
pub const USER_NAME_KEY: &str = "userName";
pub const USER_EMAIL_KEY: &str = "userEmail";
pub const ACCESS_KEY: &str = "access";

pub const SESSION_KEYS: [&str; 5] = [
    TOKEN_KEY,
    USER_ID_KEY,
    USER_NAME_KEY,
    USER_EMAIL_KEY,
    ACCESS_KEY,
];

/// Coarse role attached to a session. Not enforced here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AccessLevel {
    #[default]
    User,
    Admin,
    Other(String),
}

impl AccessLevel {
    /// Parse the server/store representation. Absent or empty means `User`.
    pub fn from_wire(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") | Some("user") => AccessLevel::User,
            Some("admin") => AccessLevel::Admin,
            Some(other) => AccessLevel::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            AccessLevel::User => "user",
            AccessLevel::Admin => "admin",
            AccessLevel::Other(s) => s,
        }
    }
}

impl From<String> for AccessLevel {
    fn from(value: String) -> Self {
        Self::from_wire(Some(&value))
    }
}

impl From<AccessLevel> for String {
    fn from(value: AccessLevel) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated identity for this process.
///
/// A `Session` value is always complete: non-empty token and user id.
/// "Logged out" is represented by the absence of a session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    pub name: String,
    pub email: String,
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub access_level: AccessLevel,
    pub token: String,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("access_level", &self.access_level)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl Session {
    /// Read a session from the store.
    ///
    /// Returns `Ok(None)` when the token or the user id is missing or empty,
    /// whatever the other three entries hold.
    pub fn read_from(store: &dyn KeyValueStore) -> Result<Option<Self>> {
        let [token, user_id, name, email, access]: [Option<String>; 5] = store
            .get_many(&SESSION_KEYS)?
            .try_into()
            .map_err(|_| anyhow::anyhow!("Store returned wrong number of entries"))?;

        let (Some(token), Some(user_id)) = (non_empty(token), non_empty(user_id)) else {
            return Ok(None);
        };

        Ok(Some(Self {
            user_id,
            name: name.unwrap_or_default(),
            email: email.unwrap_or_default(),
            access_level: AccessLevel::from_wire(access.as_deref()),
            token,
        }))
    }

    /// Store writes that persist this session, one entry per field.
    ///
    /// The token is removed first and written last. A backend that stops
    /// partway through leaves the store logged out, never holding one
    /// user's token next to another user's details.
    pub fn store_changes(&self) -> Vec<StoreChange> {
        vec![
            StoreChange::remove(TOKEN_KEY),
            StoreChange::set(USER_NAME_KEY, &self.name),
            StoreChange::set(USER_EMAIL_KEY, &self.email),
            StoreChange::set(ACCESS_KEY, self.access_level.as_str()),
            StoreChange::set(USER_ID_KEY, &self.user_id),
            StoreChange::set(TOKEN_KEY, &self.token),
        ]
    }

    /// Store writes that remove every session entry
    pub fn clear_changes() -> Vec<StoreChange> {
        SESSION_KEYS.iter().map(|k| StoreChange::remove(k)).collect()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryStore;

    fn sample() -> Session {
        Session {
            user_id: "42".to_string(),
            name: "A".to_string(),
            email: "a@b.com".to_string(),
            access_level: AccessLevel::Admin,
            token: "t1".to_string(),
        }
    }

    #[test]
    fn test_access_level_from_wire() {
        assert_eq!(AccessLevel::from_wire(None), AccessLevel::User);
        assert_eq!(AccessLevel::from_wire(Some("")), AccessLevel::User);
        assert_eq!(AccessLevel::from_wire(Some("user")), AccessLevel::User);
        assert_eq!(AccessLevel::from_wire(Some("admin")), AccessLevel::Admin);
        assert_eq!(
            AccessLevel::from_wire(Some("moderator")),
            AccessLevel::Other("moderator".to_string())
        );
        assert_eq!(AccessLevel::Other("x".to_string()).to_string(), "x");
    }

    #[test]
    fn test_read_requires_token_and_user_id() {
        let cases: [(Option<&str>, Option<&str>); 5] = [
            (None, None),
            (Some("t"), None),
            (None, Some("1")),
            (Some(""), Some("1")),
            (Some("t"), Some("")),
        ];
        for (token, user_id) in cases {
            let mut store = MemoryStore::new();
            store.set(USER_NAME_KEY, "A").expect("set");
            store.set(ACCESS_KEY, "admin").expect("set");
            if let Some(t) = token {
                store.set(TOKEN_KEY, t).expect("set");
            }
            if let Some(id) = user_id {
                store.set(USER_ID_KEY, id).expect("set");
            }
            let loaded = Session::read_from(&store).expect("read");
            assert!(loaded.is_none(), "token={token:?} user_id={user_id:?}");
        }
    }

    #[test]
    fn test_write_then_read() {
        let mut store = MemoryStore::new();
        store.apply(&sample().store_changes()).expect("apply");
        assert_eq!(Session::read_from(&store).expect("read"), Some(sample()));

        store.apply(&Session::clear_changes()).expect("apply");
        assert!(store.is_empty());
    }

    #[test]
    fn test_interrupted_write_reads_as_logged_out() {
        let mut store = MemoryStore::new();
        store.apply(&sample().store_changes()).expect("apply");

        let other = Session {
            user_id: "7".to_string(),
            name: "B".to_string(),
            email: "b@c.com".to_string(),
            access_level: AccessLevel::User,
            token: "t2".to_string(),
        };
        let changes = other.store_changes();
        assert_eq!(changes.first(), Some(&StoreChange::remove(TOKEN_KEY)));
        assert_eq!(changes.last(), Some(&StoreChange::set(TOKEN_KEY, "t2")));

        // Stop before each remaining write in turn
        for stop in 1..changes.len() {
            let mut partial = store.clone();
            partial.apply(&changes[..stop]).expect("apply");
            assert_eq!(Session::read_from(&partial).expect("read"), None, "stop={stop}");
        }
    }

    #[test]
    fn test_debug_redacts_token() {
        let out = format!("{:?}", sample());
        assert!(!out.contains("t1"));
        assert!(out.contains("<redacted>"));
    }

    #[test]
    fn test_serialize_access_as_string() {
        let json = serde_json::to_value(sample()).expect("serialize");
        assert_eq!(json["accessLevel"], "admin");
        assert_eq!(json["userId"], "42");
    }
}
