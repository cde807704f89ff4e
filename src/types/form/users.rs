use serde::{Deserialize, Serialize};
use validator::Validate;

use super::InvalidForm;
use crate::types::validation::{validate_password, validate_username};
use crate::util::Sensitive;

/// Login and registration form.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct Credentials {
    #[validate(custom = "validate_username")]
    pub username: String,
    #[validate(custom = "validate_password")]
    pub password: Sensitive<String>,
}

impl Credentials {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Sensitive::new(password.into()),
        }
    }

    pub fn validate(&self) -> error_stack::Result<(), InvalidForm> {
        super::into_result(&super::field_checks(self))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthToken {
    pub token: Sensitive<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::form::field_messages;

    #[test]
    fn accepts_well_formed_credentials() {
        assert!(Credentials::new("memo_the_lemo", "correct horse").validate().is_ok());
    }

    #[test]
    fn reports_every_invalid_field() {
        let report = Credentials::new("no spaces", "short").validate().unwrap_err();
        assert_eq!(
            field_messages(&report),
            vec![
                "password: Passwords must not be too short".to_string(),
                "username: Invalid username".to_string(),
            ]
        );

        let report = Credentials::new("", "x".repeat(300)).validate().unwrap_err();
        assert_eq!(
            field_messages(&report),
            vec![
                "password: Passwords must not be too big".to_string(),
                "username: Username is required".to_string(),
            ]
        );
    }

    #[test]
    fn password_is_hidden_from_debug() {
        let credentials = Credentials::new("alice", "wonderland");
        assert!(!format!("{credentials:?}").contains("wonderland"));
    }
}
