use error_stack::{Report, Result};
use serde::Deserialize;

use super::{Auth, Database, Logging, ParseError};
use crate::util::{figment::FigmentErrorAttachable, snowflake::MAX_WORKER_ID};

/// Where posts, users and sessions are kept.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Storage {
    /// Everything is lost once the server exits.
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Deserialize)]
pub struct Server {
    /// **Environment variables**:
    /// - `AGORA_STORAGE`
    #[serde(default)]
    pub storage: Storage,
    /// Worker id embedded in every generated ID. Each running
    /// instance sharing the same database must have a distinct one.
    ///
    /// **Environment variables**:
    /// - `AGORA_WORKER_ID`
    #[serde(default)]
    pub worker_id: u16,
    pub auth: Auth,
    pub db: Option<Database>,
    #[serde(default)]
    pub logging: Logging,
}

impl Server {
    pub fn load() -> Result<Self, ParseError> {
        dotenvy::dotenv().ok();

        let config = Self::figment()
            .extract::<Self>()
            .map_err(|e| Report::new(ParseError).attach_figment_error(e))?;

        config.validate()?;
        Ok(config)
    }

    /// Checks what serde alone cannot.
    pub fn validate(&self) -> Result<(), ParseError> {
        let mut problems = Vec::new();

        if self.worker_id > MAX_WORKER_ID {
            problems.push(format!("worker_id must be within 0..={MAX_WORKER_ID}"));
        }

        let secret_len = self.auth.jwt_secret.len();
        if !(Auth::JWT_SECRET_MIN_LEN..=Auth::JWT_SECRET_MAX_LEN).contains(&secret_len) {
            problems.push(format!(
                "Invalid JWT secret key: must be between {} and {} characters long",
                Auth::JWT_SECRET_MIN_LEN,
                Auth::JWT_SECRET_MAX_LEN
            ));
        }

        if self.auth.session_ttl_secs.get() > Auth::MAX_SESSION_TTL_SECS {
            problems.push(format!(
                "auth.session_ttl_secs must not exceed {}",
                Auth::MAX_SESSION_TTL_SECS
            ));
        }

        match (&self.db, self.storage) {
            (None, Storage::Postgres) => {
                problems.push("db is required when storage is set to postgres".into());
            }
            (Some(db), ..) if url::Url::parse(db.url.as_str()).is_err() => {
                problems.push("Invalid Postgres connection URL".into());
            }
            _ => {}
        }

        if problems.is_empty() {
            return Ok(());
        }

        let mut report = Report::new(ParseError);
        for problem in problems {
            report = report.attach_printable(problem);
        }
        Err(report)
    }
}

impl Server {
    const DEFAULT_CONFIG_FILE: &'static str = "agora.toml";

    /// Creates a default [`Figment`] object to load server
    /// configuration. This function is there for implementing
    /// [`Server::load`] and testing.
    ///
    /// [`Figment`]: figment::Figment
    pub(crate) fn figment() -> figment::Figment {
        use figment::{
            providers::{Env, Format, Toml},
            Figment,
        };

        Figment::new()
            .merge(Toml::file(Self::DEFAULT_CONFIG_FILE))
            // One big con about figment (env provider to be specific) especially
            // these fields with underscore in it.
            .merge(Env::prefixed("AGORA_").map(|v| match v.as_str() {
                "WORKER_ID" => "worker_id".into(),

                "AUTH_JWT_SECRET" => "auth.jwt_secret".into(),
                "AUTH_SESSION_TTL_SECS" => "auth.session_ttl_secs".into(),
                "AUTH_PASSWORD_MEMORY_KIB" => "auth.password.memory_kib".into(),

                "DB_MIN_IDLE" => "db.min_idle".into(),
                "DB_POOL_SIZE" => "db.pool_size".into(),
                "DB_ENFORCE_TLS" => "db.enforce_tls".into(),
                "DB_TIMEOUT_SECS" => "db.timeout_secs".into(),

                _ => v.as_str().replace('_', ".").into(),
            }))
            // Environment variable aliases
            .merge(Env::raw().only(&["DATABASE_URL"]).map(|v| match v.as_str() {
                "DATABASE_URL" => "db.url".into(),
                _ => v.into(),
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoggingStyle;
    use figment::Jail;
    use std::num::{NonZeroU32, NonZeroU64};

    const SECRET: &str = "a-very-long-secret";

    #[test]
    fn env_aliases() {
        Jail::expect_with(|jail| {
            jail.set_env("DATABASE_URL", "postgres://localhost/agora");

            jail.set_env("AGORA_STORAGE", "postgres");
            jail.set_env("AGORA_WORKER_ID", "42");

            jail.set_env("AGORA_AUTH_JWT_SECRET", SECRET);
            jail.set_env("AGORA_AUTH_SESSION_TTL_SECS", "60");
            jail.set_env("AGORA_AUTH_PASSWORD_MEMORY_KIB", "4096");
            jail.set_env("AGORA_AUTH_PASSWORD_ITERATIONS", "3");

            jail.set_env("AGORA_DB_MIN_IDLE", "100");
            jail.set_env("AGORA_DB_POOL_SIZE", "100");
            jail.set_env("AGORA_DB_ENFORCE_TLS", "false");
            jail.set_env("AGORA_DB_TIMEOUT_SECS", "3030");

            jail.set_env("AGORA_LOGGING_STYLE", "pretty");

            let config: Server = Server::figment().extract()?;
            assert_eq!(config.storage, Storage::Postgres);
            assert_eq!(config.worker_id, 42);

            assert_eq!(config.auth.jwt_secret.as_str(), SECRET);
            assert_eq!(config.auth.session_ttl(), chrono::Duration::seconds(60));
            assert_eq!(config.auth.password.memory_kib, 4096);
            assert_eq!(config.auth.password.iterations, 3);
            assert_eq!(config.auth.password.parallelism, argon2::Params::DEFAULT_P_COST);

            let db = config.db.as_ref().unwrap();
            assert_eq!(db.url.as_str(), "postgres://localhost/agora");
            assert_eq!(db.min_idle, NonZeroU32::new(100));
            assert_eq!(db.pool_size, NonZeroU32::new(100).unwrap());
            assert!(!db.enforce_tls);
            assert_eq!(db.timeout_secs, NonZeroU64::new(3030).unwrap());

            assert_eq!(config.logging.style, LoggingStyle::Pretty);
            assert!(config.validate().is_ok());

            Ok(())
        });
    }

    #[test]
    fn defaults_from_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "agora.toml",
                r#"
                [auth]
                jwt_secret = "a-very-long-secret"
                "#,
            )?;

            let config: Server = Server::figment().extract()?;
            assert_eq!(config.storage, Storage::Memory);
            assert_eq!(config.worker_id, 0);
            assert!(config.db.is_none());
            assert_eq!(config.auth.session_ttl(), chrono::Duration::days(7));
            assert_eq!(config.auth.password.memory_kib, argon2::Params::DEFAULT_M_COST);
            assert_eq!(config.logging.targets, "info");
            assert_eq!(config.logging.style, LoggingStyle::Full);
            assert!(config.validate().is_ok());

            Ok(())
        });
    }

    #[test]
    fn reports_every_problem() {
        Jail::expect_with(|jail| {
            jail.set_env("AGORA_STORAGE", "postgres");
            jail.set_env("AGORA_WORKER_ID", "4096");
            jail.set_env("AGORA_AUTH_JWT_SECRET", "short");

            let config: Server = Server::figment().extract()?;
            let report = config.validate().unwrap_err();

            let problems = report
                .frames()
                .filter_map(|frame| frame.downcast_ref::<String>())
                .count();
            assert_eq!(problems, 3);

            Ok(())
        });
    }

    #[test]
    fn rejects_invalid_database_url() {
        Jail::expect_with(|jail| {
            jail.set_env("AGORA_AUTH_JWT_SECRET", SECRET);
            jail.set_env("DATABASE_URL", "not a url");

            let config: Server = Server::figment().extract()?;
            assert!(config.validate().is_err());

            Ok(())
        });
    }

    #[test]
    fn requires_jwt_secret() {
        Jail::expect_with(|_| {
            assert!(Server::figment().extract::<Server>().is_err());
            Ok(())
        });
    }
}
