use chrono::{DateTime, Duration, Utc};
use error_stack::{Report, Result, ResultExt};
use std::sync::Arc;
use thiserror::Error;

use super::token::{Claims, TokenCodec};
use crate::config;
use crate::model::{User, UserError, UserSnapshot};
use crate::storage::{SessionRecord, SessionStore, UserRepository};
use crate::util::{fingerprint, Sensitive, Snowflake};

const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("Authentication required")]
    Unauthenticated,
    #[error("Invalid session token")]
    BadToken,
    #[error("Failed to issue session token")]
    Internal,
    #[error("Failed to access session storage")]
    Storage,
}

/// An authenticated user bound to the token they presented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: Sensitive<String>,
    pub user: UserSnapshot,
    pub expires_at: DateTime<Utc>,
}

/// Issues session tokens and resolves them back to users.
#[derive(Debug)]
pub struct SessionManager {
    codec: TokenCodec,
    snowflake: Arc<Snowflake>,
    ttl: Duration,
    store: Arc<dyn SessionStore>,
    users: Arc<dyn UserRepository>,
}

impl SessionManager {
    #[must_use]
    pub fn new(
        codec: TokenCodec,
        snowflake: Arc<Snowflake>,
        ttl: Duration,
        store: Arc<dyn SessionStore>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            codec,
            snowflake,
            ttl,
            store,
            users,
        }
    }

    #[must_use]
    pub fn from_config(
        cfg: &config::Auth,
        snowflake: Arc<Snowflake>,
        store: Arc<dyn SessionStore>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        let codec = TokenCodec::new(cfg.jwt_secret.as_bytes());
        Self::new(codec, snowflake, cfg.session_ttl(), store, users)
    }

    #[tracing::instrument(skip_all, fields(user.id = %user.id), name = "sessions.create")]
    pub async fn create(&self, user: &User) -> Result<Session, SessionError> {
        let claims = Claims::new(
            self.snowflake.next_id(),
            user.snapshot(),
            Utc::now(),
            self.ttl,
        );
        let token = self
            .codec
            .encode(&claims)
            .change_context(SessionError::Internal)?;

        let expires_at = claims.expires_at();
        self.store
            .insert(SessionRecord {
                token: token.clone(),
                user_id: user.id,
                user: Some(claims.user.clone()),
                expires_at,
            })
            .await?;

        tracing::debug!(token = %fingerprint(&token), %expires_at, "issued session");
        Ok(Session {
            token: Sensitive::new(token),
            user: claims.user,
            expires_at,
        })
    }

    /// Resolves the value of an `Authorization` header.
    pub async fn check_header(&self, header: Option<&str>) -> Result<Session, SessionError> {
        let token = header
            .and_then(|v| v.strip_prefix(BEARER_PREFIX))
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                Report::new(SessionError::Unauthenticated)
                    .attach_printable("missing bearer token in authorization header")
            })?;

        self.check(token).await
    }

    #[tracing::instrument(skip_all, fields(token = %fingerprint(token)), name = "sessions.check")]
    pub async fn check(&self, token: &str) -> Result<Session, SessionError> {
        let claims = self
            .codec
            .decode(token)
            .change_context(SessionError::BadToken)?;

        let Some(record) = self.store.find(token).await? else {
            return Err(Report::new(SessionError::Unauthenticated)
                .attach_printable("session does not exist or has been revoked"));
        };

        let now = Utc::now();
        if record.is_expired(now) || claims.expires_at() <= now {
            if let Err(error) = self.store.delete(token).await {
                tracing::warn!(?error, "could not delete expired session");
            }
            return Err(Report::new(SessionError::Unauthenticated)
                .attach_printable(format!("session expired at {}", record.expires_at)));
        }

        if record.user_id != claims.user.id {
            return Err(Report::new(SessionError::Unauthenticated)
                .attach_printable("token was not issued for the stored user"));
        }

        let user = match self.users.by_id(record.user_id).await {
            Ok(user) => user,
            Err(error) if *error.current_context() == UserError::NoSuchUser => {
                return Err(error
                    .change_context(SessionError::Unauthenticated)
                    .attach_printable("session user no longer exists"));
            }
            Err(error) => return Err(error.change_context(SessionError::Storage)),
        };

        Ok(Session {
            token: Sensitive::new(token.to_owned()),
            user: record.user.unwrap_or_else(|| user.snapshot()),
            expires_at: record.expires_at,
        })
    }

    /// Invalidates the token server-side.
    #[tracing::instrument(skip_all, fields(token = %fingerprint(token)), name = "sessions.revoke")]
    pub async fn revoke(&self, token: &str) -> Result<bool, SessionError> {
        self.store.delete(token).await
    }

    #[tracing::instrument(skip_all, name = "sessions.purge_expired")]
    pub async fn purge_expired(&self) -> Result<u64, SessionError> {
        let purged = self.store.purge_expired(Utc::now()).await?;
        tracing::info!(purged, "purged expired sessions");
        Ok(purged)
    }
}
