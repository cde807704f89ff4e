use error_stack::{Result, ResultExt};

use super::CliError;
use agora::App;

/// Only durable sessions outlive the process, so this needs Postgres.
pub async fn run(app: &App) -> Result<(), CliError> {
    app.db()
        .change_context(CliError)
        .attach_printable("expired sessions can only be purged from postgres")?;

    let purged = app.sessions.purge_expired().await.change_context(CliError)?;
    tracing::info!("purged {purged} expired session(s)");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora::config;
    use figment::{providers::Serialized, Figment};

    #[tokio::test]
    async fn refuses_memory_storage() {
        let cfg: config::Server = Figment::new()
            .merge(Serialized::default("auth.jwt_secret", "sup3r-s3cr3t-k3y"))
            .merge(Serialized::default("storage", "memory"))
            .extract()
            .unwrap();

        let app = App::new(cfg).await.unwrap();
        let report = run(&app).await.unwrap_err();
        assert!(format!("{report:?}").contains("storage is not set to postgres"));
    }
}
