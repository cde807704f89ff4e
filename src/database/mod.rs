use error_stack::{Report, ResultExt};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use std::{str::FromStr, time::Duration};
use tokio::time::Instant;

use crate::config;

mod error;
pub use error::*;

pub type Transaction = sqlx::Transaction<'static, sqlx::Postgres>;
pub type PoolConnection = sqlx::pool::PoolConnection<sqlx::Postgres>;
pub type Connection = sqlx::PgConnection;

#[derive(Clone)]
pub struct Pool {
    pool: sqlx::PgPool,
}

impl Pool {
    /// Builds a lazily connected pool. An unreachable database at startup
    /// is not fatal, later calls will report it as [`Error::UnhealthyPool`].
    #[tracing::instrument(skip_all, name = "db.connect_pool")]
    pub async fn new(cfg: &config::Database) -> Result<Self> {
        let mut pool_opts = PgPoolOptions::new()
            .acquire_timeout(Duration::from_secs(cfg.timeout_secs.get()))
            .max_connections(cfg.pool_size.get());

        if let Some(min_idle) = cfg.min_idle {
            pool_opts = pool_opts.min_connections(min_idle.get());
        }

        let mut connect_opts =
            PgConnectOptions::from_str(cfg.url.as_str()).change_context(Error::InvalidUrl)?;

        if cfg.enforce_tls {
            connect_opts = connect_opts.ssl_mode(PgSslMode::Require);
        }

        let pool = Self {
            pool: pool_opts.connect_lazy_with(connect_opts),
        };

        match pool.wait_until_healthy().await {
            Ok(..) => {}
            Err(err) if err.is_unhealthy() => {
                tracing::warn!(error = ?err, "database is not reachable yet");
            }
            Err(err) => return Err(err),
        }

        Ok(pool)
    }
}

impl From<sqlx::PgPool> for Pool {
    fn from(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.pool.fmt(f)
    }
}

impl Pool {
    #[must_use]
    pub fn connections(&self) -> u32 {
        self.pool.size()
    }

    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.connections() > 0
    }

    #[tracing::instrument(name = "db.transaction", skip(self))]
    pub async fn begin(&self) -> Result<Transaction> {
        if let Some(inner) = self.pool.try_begin().await.into_db_error()? {
            Ok(inner)
        } else {
            let result = self.pool.begin().await;
            result.map_err(|e| match e {
                sqlx::Error::PoolTimedOut if !self.is_healthy() => {
                    Report::new(e).change_context(Error::UnhealthyPool)
                }
                e => Report::new(Error::Internal(e)),
            })
        }
    }

    #[tracing::instrument(name = "db.connect", skip(self))]
    pub async fn get(&self) -> Result<PoolConnection> {
        if let Some(inner) = self.pool.try_acquire() {
            Ok(inner)
        } else {
            let result = self.pool.acquire().await;
            result.map_err(|e| match e {
                sqlx::Error::PoolTimedOut if !self.is_healthy() => {
                    Report::new(e).change_context(Error::UnhealthyPool)
                }
                e => Report::new(Error::Internal(e)),
            })
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn wait_until_healthy(&self) -> Result<()> {
        match self.pool.acquire().await {
            Ok(..) => Ok(()),
            Err(e) if !self.is_healthy() => Err(e).change_context(Error::UnhealthyPool),
            Err(err) => Err(Report::new(Error::Internal(err))),
        }
    }

    /// Applies every pending migration under `migrations/`.
    #[tracing::instrument(skip_all, name = "migrations.run_pending")]
    pub async fn migrate(&self) -> error_stack::Result<(), MigrationError> {
        let now = Instant::now();
        tracing::info!("Performing database migrations... (this may take a while)");

        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .change_context(MigrationError)?;

        let elapsed = now.elapsed();
        tracing::info!("Successfully performed database migrations! took {elapsed:.2?}");
        Ok(())
    }
}
