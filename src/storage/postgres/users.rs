use async_trait::async_trait;
use error_stack::{Report, Result, ResultExt};
use sqlx::FromRow;
use std::sync::Arc;

use crate::auth::PasswordHasher;
use crate::database::{self, ErrorExt, ErrorExt2};
use crate::model::{User, UserError};
use crate::storage::UserRepository;
use crate::types::form::Credentials;
use crate::types::id::{marker::UserMarker, Id};
use crate::util::Snowflake;

#[derive(Debug, FromRow)]
struct UserRow {
    id: Id<UserMarker>,
    username: String,
    password_hash: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgUserRepository {
    pool: database::Pool,
    hasher: PasswordHasher,
    snowflake: Arc<Snowflake>,
}

impl PgUserRepository {
    #[must_use]
    pub fn new(pool: database::Pool, hasher: PasswordHasher, snowflake: Arc<Snowflake>) -> Self {
        Self {
            pool,
            hasher,
            snowflake,
        }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    #[tracing::instrument(skip_all, fields(username = %credentials.username), name = "pg.users.register")]
    async fn register(&self, credentials: &Credentials) -> Result<User, UserError> {
        let password_hash = self
            .hasher
            .hash(credentials.password.as_str())
            .await
            .change_context(UserError::Internal)?;

        let mut conn = self.pool.get().await.change_context(UserError::Storage)?;
        let row = sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (id, username, password_hash) VALUES ($1, $2, $3) \
             RETURNING id, username, password_hash",
        )
        .bind(self.snowflake.next_id::<UserMarker>())
        .bind(&credentials.username)
        .bind(&password_hash)
        .fetch_one(&mut *conn)
        .await
        .into_db_error()
        .map_err(|error| {
            let context = if error.is_unique_violation() {
                UserError::AlreadyExists
            } else {
                UserError::Storage
            };
            error.change_context(context)
        })?;

        Ok(row.into())
    }

    #[tracing::instrument(skip_all, fields(username = %credentials.username), name = "pg.users.authorize")]
    async fn authorize(&self, credentials: &Credentials) -> Result<User, UserError> {
        let mut conn = self.pool.get().await.change_context(UserError::Storage)?;
        let user: User = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, password_hash FROM users WHERE username = $1",
        )
        .bind(&credentials.username)
        .fetch_optional(&mut *conn)
        .await
        .into_db_error()
        .change_context(UserError::Storage)?
        .ok_or_else(|| Report::new(UserError::NoSuchUser))?
        .into();

        // hashing may take a while
        drop(conn);

        let matched = self
            .hasher
            .verify(credentials.password.as_str(), user.password_hash.as_str())
            .await
            .change_context(UserError::Internal)?;

        if matched {
            Ok(user)
        } else {
            Err(Report::new(UserError::BadCredentials))
        }
    }

    #[tracing::instrument(skip(self), name = "pg.users.by_id")]
    async fn by_id(&self, id: Id<UserMarker>) -> Result<User, UserError> {
        let mut conn = self.pool.get().await.change_context(UserError::Storage)?;
        sqlx::query_as::<_, UserRow>("SELECT id, username, password_hash FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .into_db_error()
            .change_context(UserError::Storage)?
            .map(User::from)
            .ok_or_else(|| {
                Report::new(UserError::NoSuchUser).attach_printable(format!("user {id} does not exist"))
            })
    }
}
