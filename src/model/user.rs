use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::id::{marker::UserMarker, Id};
use crate::util::Sensitive;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum UserError {
    #[error("username is already taken")]
    AlreadyExists,
    #[error("no user found")]
    NoSuchUser,
    #[error("invalid password")]
    BadCredentials,
    #[error("invalid credentials form")]
    Validation,
    #[error("failed to process password")]
    Internal,
    #[error("failed to access user storage")]
    Storage,
}

/// Registered account. The password hash never leaves the
/// process through serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Id<UserMarker>,
    pub username: String,
    pub password_hash: Sensitive<String>,
}

impl User {
    #[must_use]
    pub fn snapshot(&self) -> UserSnapshot {
        UserSnapshot {
            id: self.id,
            username: self.username.clone(),
        }
    }
}

/// Copy of the public user data, embedded in posts, comments and
/// sessions at the time they were created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct UserSnapshot {
    pub id: Id<UserMarker>,
    pub username: String,
}

impl From<&User> for UserSnapshot {
    fn from(value: &User) -> Self {
        value.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_leaves_out_password() {
        let user = User {
            id: Id::new(5),
            username: "alice".into(),
            password_hash: String::from("$argon2id$...").into(),
        };

        let json = serde_json::to_value(user.snapshot()).unwrap();
        assert_eq!(json, serde_json::json!({ "id": "5", "username": "alice" }));
    }
}
