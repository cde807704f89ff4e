use clap::Parser;
use error_stack::{Result, ResultExt};
use thiserror::Error;

mod migrate;
mod purge_sessions;

#[derive(Debug, Error)]
#[error("Failed to run command")]
pub struct CliError;

/// Command line options for agora.
#[derive(Debug, Parser)]
#[command(about = "Maintenance tools for the agora backend", version, long_about)]
pub struct Cli {
    #[clap(subcommand)]
    pub subcommand: Subcommand,
}

impl Cli {
    pub fn run(self) -> Result<(), CliError> {
        let config = agora::config::Server::load().change_context(CliError)?;
        agora::logging::init(&config.logging).change_context(CliError)?;

        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .change_context(CliError)
            .attach_printable("could not build tokio runtime")?
            .block_on(async move {
                let app = agora::App::new(config).await.change_context(CliError)?;
                match self.subcommand {
                    Subcommand::Migrate => self::migrate::run(&app).await,
                    Subcommand::PurgeSessions => self::purge_sessions::run(&app).await,
                }
            })
    }
}

#[derive(Debug, Parser)]
pub enum Subcommand {
    /// Apply pending migrations to the configured Postgres database
    Migrate,
    /// Delete every expired session
    PurgeSessions,
}
