use async_trait::async_trait;
use chrono::{DateTime, Utc};
use error_stack::{Result, ResultExt};
use sqlx::FromRow;

use crate::auth::SessionError;
use crate::database::{self, ErrorExt};
use crate::storage::{SessionRecord, SessionStore};
use crate::types::id::{marker::UserMarker, Id};

#[derive(Debug, FromRow)]
struct SessionRow {
    token: String,
    user_id: Id<UserMarker>,
    expires_at: DateTime<Utc>,
}

/// Sessions surviving restarts. Only the user id is kept, so the
/// user is always fetched again when a token gets checked.
#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: database::Pool,
}

impl PgSessionStore {
    #[must_use]
    pub fn new(pool: database::Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    #[tracing::instrument(skip_all, name = "pg.sessions.insert")]
    async fn insert(&self, record: SessionRecord) -> Result<(), SessionError> {
        let mut conn = self.pool.get().await.change_context(SessionError::Storage)?;
        sqlx::query("INSERT INTO sessions (token, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(&record.token)
            .bind(record.user_id)
            .bind(record.expires_at)
            .execute(&mut *conn)
            .await
            .into_db_error()
            .change_context(SessionError::Storage)?;

        Ok(())
    }

    #[tracing::instrument(skip_all, name = "pg.sessions.find")]
    async fn find(&self, token: &str) -> Result<Option<SessionRecord>, SessionError> {
        let mut conn = self.pool.get().await.change_context(SessionError::Storage)?;
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT token, user_id, expires_at FROM sessions WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&mut *conn)
        .await
        .into_db_error()
        .change_context(SessionError::Storage)?;

        Ok(row.map(|row| SessionRecord {
            token: row.token,
            user_id: row.user_id,
            user: None,
            expires_at: row.expires_at,
        }))
    }

    #[tracing::instrument(skip_all, name = "pg.sessions.delete")]
    async fn delete(&self, token: &str) -> Result<bool, SessionError> {
        let mut conn = self.pool.get().await.change_context(SessionError::Storage)?;
        let result = sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&mut *conn)
            .await
            .into_db_error()
            .change_context(SessionError::Storage)?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), name = "pg.sessions.purge_expired")]
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, SessionError> {
        let mut conn = self.pool.get().await.change_context(SessionError::Storage)?;
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&mut *conn)
            .await
            .into_db_error()
            .change_context(SessionError::Storage)?;

        Ok(result.rows_affected())
    }
}
