use error_stack::{Result, ResultExt};
use std::sync::Arc;
use thiserror::Error;

use crate::auth::{PasswordHasher, SessionManager};
use crate::config::{self, Storage};
use crate::database;
use crate::storage::{
    MemoryPostRepository, MemorySessionStore, MemoryUserRepository, PgPostRepository,
    PgSessionStore, PgUserRepository, PostRepository, SessionStore, UserRepository,
};
use crate::util::Snowflake;

/// Everything a request needs, shared between workers.
#[derive(Debug, Clone)]
pub struct App {
    pub config: Arc<config::Server>,
    pub snowflake: Arc<Snowflake>,
    pub posts: Arc<dyn PostRepository>,
    pub users: Arc<dyn UserRepository>,
    pub sessions: Arc<SessionManager>,
    /// Only available if `storage` is set to `postgres`.
    pub db: Option<database::Pool>,
}

#[derive(Debug, Error)]
#[error("Failed to initialize App struct")]
pub struct AppError;

impl App {
    #[tracing::instrument(skip_all, fields(storage = ?cfg.storage))]
    pub async fn new(cfg: config::Server) -> Result<Self, AppError> {
        let snowflake = Arc::new(Snowflake::new(cfg.worker_id).change_context(AppError)?);
        let hasher = PasswordHasher::new(&cfg.auth.password).change_context(AppError)?;

        let (posts, users, store, db): (
            Arc<dyn PostRepository>,
            Arc<dyn UserRepository>,
            Arc<dyn SessionStore>,
            _,
        ) = match (cfg.storage, cfg.db.as_ref()) {
            (Storage::Memory, ..) => (
                Arc::new(MemoryPostRepository::new()),
                Arc::new(MemoryUserRepository::new(hasher, snowflake.clone())),
                Arc::new(MemorySessionStore::new()),
                None,
            ),
            (Storage::Postgres, Some(db_cfg)) => {
                let pool = database::Pool::new(db_cfg).await.change_context(AppError)?;
                (
                    Arc::new(PgPostRepository::new(pool.clone())),
                    Arc::new(PgUserRepository::new(pool.clone(), hasher, snowflake.clone())),
                    Arc::new(PgSessionStore::new(pool.clone())),
                    Some(pool),
                )
            }
            (Storage::Postgres, None) => {
                return Err(error_stack::Report::new(AppError)
                    .attach_printable("postgres storage requires database configuration"));
            }
        };

        let sessions = SessionManager::from_config(&cfg.auth, snowflake.clone(), store, users.clone());
        Ok(Self {
            config: Arc::new(cfg),
            snowflake,
            posts,
            users,
            sessions: Arc::new(sessions),
            db,
        })
    }

    /// Returns the database pool, failing if the app is not backed by Postgres.
    pub fn db(&self) -> Result<&database::Pool, AppError> {
        self.db.as_ref().ok_or_else(|| {
            error_stack::Report::new(AppError)
                .attach_printable("storage is not set to postgres")
        })
    }
}

#[cfg(test)]
impl App {
    /// In-memory app with cheap password hashing.
    pub(crate) fn for_tests() -> Self {
        use crate::auth::password::tests::cheap_hasher;
        use crate::auth::TokenCodec;
        use figment::{providers::Serialized, Figment};

        let cfg: config::Server = Figment::new()
            .merge(Serialized::default("auth.jwt_secret", "sup3r-s3cr3t-k3y"))
            .extract()
            .unwrap();

        let snowflake = Arc::new(Snowflake::new(0).unwrap());
        let users: Arc<dyn UserRepository> =
            Arc::new(MemoryUserRepository::new(cheap_hasher(), snowflake.clone()));
        let sessions = SessionManager::new(
            TokenCodec::new(cfg.auth.jwt_secret.as_bytes()),
            snowflake.clone(),
            cfg.auth.session_ttl(),
            Arc::new(MemorySessionStore::new()),
            users.clone(),
        );

        Self {
            config: Arc::new(cfg),
            snowflake,
            posts: Arc::new(MemoryPostRepository::new()),
            users,
            sessions: Arc::new(sessions),
            db: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::{providers::Serialized, Figment};

    fn config(storage: &str) -> config::Server {
        Figment::new()
            .merge(Serialized::default("auth.jwt_secret", "sup3r-s3cr3t-k3y"))
            .merge(Serialized::default("auth.password.memory_kib", 8))
            .merge(Serialized::default("auth.password.iterations", 1))
            .merge(Serialized::default("auth.password.parallelism", 1))
            .merge(Serialized::default("storage", storage))
            .extract()
            .unwrap()
    }

    #[tokio::test]
    async fn builds_memory_backends() {
        let app = App::new(config("memory")).await.unwrap();
        assert!(app.db.is_none());
        assert!(app.db().is_err());
        assert!(app.posts.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn postgres_requires_database_config() {
        assert!(App::new(config("postgres")).await.is_err());
    }

    #[tokio::test]
    async fn rejects_out_of_range_worker_id() {
        let mut cfg = config("memory");
        cfg.worker_id = u16::MAX;
        assert!(App::new(cfg).await.is_err());
    }
}
