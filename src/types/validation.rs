use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;
use validator::ValidationError;

use crate::util::Sensitive;

pub const USERNAME_MAX: usize = 32;
#[allow(clippy::unwrap_used)]
static USERNAME_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_]+$").unwrap());

pub const PASSWORD_MIN: usize = 8;
pub const PASSWORD_MAX: usize = 255;

pub fn is_valid_username(name: &str) -> bool {
    name.len() <= USERNAME_MAX && USERNAME_REGEX.is_match(name)
}

pub fn is_valid_password(pass: &str) -> bool {
    (PASSWORD_MIN..=PASSWORD_MAX).contains(&pass.len())
}

/// Link posts only accept absolute URLs that can be opened
/// from a browser.
pub fn is_valid_link(link: &str) -> bool {
    Url::parse(link)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
        .unwrap_or_default()
}

pub(crate) fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(message.into());
    error
}

fn present(value: &str, message: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(invalid("required", message))
    } else {
        Ok(())
    }
}

pub(crate) fn validate_username(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        Err(invalid("required", "Username is required"))
    } else if is_valid_username(name) {
        Ok(())
    } else {
        Err(invalid("username", "Invalid username"))
    }
}

pub(crate) fn validate_password(password: &Sensitive<String>) -> Result<(), ValidationError> {
    if is_valid_password(password) {
        Ok(())
    } else if password.len() > PASSWORD_MAX {
        Err(invalid("too_long", "Passwords must not be too big"))
    } else {
        Err(invalid("too_short", "Passwords must not be too short"))
    }
}

pub(crate) fn validate_title(title: &str) -> Result<(), ValidationError> {
    present(title, "Title is required")
}

pub(crate) fn validate_category(category: &str) -> Result<(), ValidationError> {
    present(category, "Category is required")
}

pub(crate) fn validate_comment(comment: &str) -> Result<(), ValidationError> {
    present(comment, "Comment must not be empty")
}

pub(crate) fn validate_link(url: Option<&str>) -> Result<(), ValidationError> {
    match url {
        None | Some("") => Err(invalid("required", "Link posts require a URL")),
        Some(url) if !is_valid_link(url) => Err(invalid("url", "Invalid URL")),
        Some(..) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_username() {
        assert!(is_valid_username("memothelemo"));
        assert!(is_valid_username("crossword_puzzle"));
        assert!(is_valid_username("2pac"));
        assert!(is_valid_username("_apple"));

        assert!(!is_valid_username(""));
        assert!(!is_valid_username("mark.robes"));
        assert!(!is_valid_username("salmon-ella"));
        assert!(!is_valid_username("pretty ugly"));
        assert!(!is_valid_username(&"a".repeat(USERNAME_MAX + 1)));
    }

    #[test]
    fn test_is_valid_password() {
        assert!(is_valid_password("12345678"));
        assert!(is_valid_password(&"p".repeat(PASSWORD_MAX)));
        assert!(!is_valid_password("1234567"));
        assert!(!is_valid_password(&"p".repeat(PASSWORD_MAX + 1)));
    }

    #[test]
    fn test_is_valid_link() {
        assert!(is_valid_link("https://www.rust-lang.org/learn"));
        assert!(is_valid_link("http://localhost:8080/"));
        assert!(!is_valid_link("www.rust-lang.org"));
        assert!(!is_valid_link("javascript:alert(1)"));
        assert!(!is_valid_link(""));
    }

    #[test]
    fn test_field_validators_pick_one_code() {
        assert_eq!(validate_username("").unwrap_err().code, "required");
        assert_eq!(validate_username("a b").unwrap_err().code, "username");
        assert!(validate_username("alice").is_ok());

        let short = Sensitive::new("short".to_string());
        let long = Sensitive::new("p".repeat(PASSWORD_MAX + 1));
        assert_eq!(validate_password(&short).unwrap_err().code, "too_short");
        assert_eq!(validate_password(&long).unwrap_err().code, "too_long");

        assert_eq!(validate_title(" \t").unwrap_err().code, "required");
        assert_eq!(validate_link(Some("ftp://x")).unwrap_err().code, "url");
        assert_eq!(validate_link(None).unwrap_err().code, "required");
        assert!(validate_link(Some("https://example.com")).is_ok());
    }
}
