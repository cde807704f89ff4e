use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Kind of failure reported back to whoever performed the request.
///
/// Authorization and lookup failures always keep their own variant
/// so callers can react to them differently.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Error {
    Internal,
    NotFound,
    Forbidden,
    Unauthenticated,
    BadToken,
    AlreadyExists,
    InvalidCredentials,
    InvalidFormBody { errors: Vec<String> },
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Internal => f.write_str("Failed to perform request"),
            Error::NotFound => f.write_str("Requested resource does not exist"),
            Error::Forbidden => f.write_str("Not allowed to modify this resource"),
            Error::Unauthenticated => f.write_str("Authentication required"),
            Error::BadToken => f.write_str("Malformed or forged session token"),
            Error::AlreadyExists => f.write_str("User already exists"),
            Error::InvalidCredentials => f.write_str("Bad username or password"),
            Error::InvalidFormBody { .. } => {
                f.write_str("User performed request with invalid body")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_test::Token;

    #[track_caller]
    fn assert_unit_variant(value: Error, variant: &'static str) {
        serde_test::assert_tokens(
            &value,
            &[
                Token::Struct {
                    name: "Error",
                    len: 1,
                },
                Token::Str("type"),
                Token::Str(variant),
                Token::StructEnd,
            ],
        );
    }

    #[test]
    fn test_serde_impl() {
        assert_unit_variant(Error::Internal, "internal");
        assert_unit_variant(Error::NotFound, "not_found");
        assert_unit_variant(Error::Forbidden, "forbidden");
        assert_unit_variant(Error::Unauthenticated, "unauthenticated");
        assert_unit_variant(Error::BadToken, "bad_token");
        assert_unit_variant(Error::AlreadyExists, "already_exists");
        assert_unit_variant(Error::InvalidCredentials, "invalid_credentials");
    }

    #[test]
    fn test_form_errors_are_listed() {
        let error = Error::InvalidFormBody {
            errors: vec!["username: Invalid username".into()],
        };
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "invalid_form_body",
                "errors": ["username: Invalid username"],
            })
        );
    }
}
