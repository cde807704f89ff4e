use chrono::{DateTime, Duration, TimeZone, Utc};
use error_stack::{Report, Result, ResultExt};
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::UserSnapshot;
use crate::types::id::{marker::SessionMarker, Id};

const ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("Failed to sign token")]
    Sign,
    #[error("Invalid token")]
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Claims {
    pub jti: Id<SessionMarker>,
    pub user: UserSnapshot,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    #[must_use]
    pub fn new(
        jti: Id<SessionMarker>,
        user: UserSnapshot,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            jti,
            user,
            iat: issued_at.timestamp(),
            exp: (issued_at + ttl).timestamp(),
        }
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Signs and verifies session tokens with a server-held secret.
///
/// Only HS256 signed tokens are ever accepted. Whether a token has
/// expired is left to the caller.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(ALGORITHM);
        validation.algorithms = vec![ALGORITHM];
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn encode(&self, claims: &Claims) -> Result<String, TokenError> {
        jsonwebtoken::encode(&Header::new(ALGORITHM), claims, &self.encoding)
            .change_context(TokenError::Sign)
            .attach_printable("could not encode session claims")
    }

    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        match jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation) {
            Ok(data) => Ok(data.claims),
            Err(error) => {
                let reason = match error.kind() {
                    ErrorKind::InvalidAlgorithm => "unexpected signing algorithm",
                    ErrorKind::InvalidSignature => "signature mismatch",
                    ErrorKind::MissingRequiredClaim(..) => "missing expiration claim",
                    ErrorKind::Json(..) => "malformed claims",
                    _ => "malformed token",
                };
                Err(Report::new(error)
                    .change_context(TokenError::Invalid)
                    .attach_printable(reason))
            }
        }
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &ALGORITHM)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &[u8] = b"sup3r-s3cr3t-k3y";

    fn alice() -> UserSnapshot {
        UserSnapshot {
            id: Id::new(1),
            username: "alice".into(),
        }
    }

    fn sign_raw(algorithm: Algorithm, claims: &serde_json::Value, secret: &[u8]) -> String {
        jsonwebtoken::encode(&Header::new(algorithm), claims, &EncodingKey::from_secret(secret))
            .unwrap()
    }

    #[test]
    fn round_trip() {
        let codec = TokenCodec::new(SECRET);
        let claims = Claims::new(Id::new(1), alice(), Utc::now(), Duration::days(7));

        let token = codec.encode(&claims).unwrap();
        assert_eq!(codec.decode(&token).unwrap(), claims);
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);
    }

    #[test]
    fn expired_tokens_still_decode() {
        let codec = TokenCodec::new(SECRET);
        let claims = Claims::new(Id::new(1), alice(), Utc::now() - Duration::days(30), Duration::days(7));

        let token = codec.encode(&claims).unwrap();
        let decoded = codec.decode(&token).unwrap();
        assert!(decoded.expires_at() < Utc::now());
    }

    #[test]
    fn rejects_other_secrets() {
        let codec = TokenCodec::new(SECRET);
        let token = TokenCodec::new(b"another-secret-key")
            .encode(&Claims::new(Id::new(1), alice(), Utc::now(), Duration::days(7)))
            .unwrap();

        let report = codec.decode(&token).unwrap_err();
        assert_eq!(report.current_context(), &TokenError::Invalid);
    }

    #[test]
    fn rejects_other_algorithms() {
        let codec = TokenCodec::new(SECRET);
        let claims = json!({ "jti": "1", "user": { "id": "1", "username": "alice" }, "iat": 0, "exp": i64::MAX });
        let token = sign_raw(Algorithm::HS512, &claims, SECRET);

        let report = codec.decode(&token).unwrap_err();
        assert_eq!(report.current_context(), &TokenError::Invalid);
    }

    #[test]
    fn rejects_missing_or_malformed_expiration() {
        let codec = TokenCodec::new(SECRET);

        let claims = json!({ "jti": "1", "user": { "id": "1", "username": "alice" }, "iat": 0 });
        let token = sign_raw(ALGORITHM, &claims, SECRET);
        assert!(codec.decode(&token).is_err());

        let claims = json!({ "jti": "1", "user": { "id": "1", "username": "alice" }, "iat": 0, "exp": "tomorrow" });
        let token = sign_raw(ALGORITHM, &claims, SECRET);
        assert!(codec.decode(&token).is_err());
    }

    #[test]
    fn rejects_garbage() {
        let codec = TokenCodec::new(SECRET);
        assert!(codec.decode("").is_err());
        assert!(codec.decode("not.a.jwt").is_err());
    }
}
